use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::markdown::{backlinks_to, parse_metadata};
use super::{Backlink, Collection, DocumentMeta, DocumentStat};

/// A vault of Markdown files on the local filesystem.
///
/// Every `.md` file below `root` is a document; hidden directories such as
/// `.obsidian` or `.git` are skipped.
#[derive(Debug, Clone)]
pub struct FsCollection {
    root: PathBuf,
}

impl FsCollection {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("vault directory '{}' does not exist", root.display());
        }
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve vault directory '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collection key for an absolute path under the root, if it is a document.
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if !is_markdown(rel) || is_hidden(rel) {
            return None;
        }
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid document path '{key}'");
        }
        Ok(self.root.join(rel))
    }

    fn stat_from(key: String, meta: &std::fs::Metadata) -> DocumentStat {
        let modified = meta.modified().ok().map(epoch_millis).unwrap_or(0);
        let created = meta
            .created()
            .ok()
            .map(epoch_millis)
            .unwrap_or(modified);
        DocumentStat {
            path: key,
            size: meta.len(),
            created,
            modified,
        }
    }

    async fn read_all(&self) -> Result<Vec<(String, String)>> {
        let mut docs = Vec::new();
        for stat in self.list_documents().await? {
            match self.read(&stat.path).await {
                Ok(content) => docs.push((stat.path, content)),
                Err(e) => warn!(path = %stat.path, error = %e, "skipping unreadable document"),
            }
        }
        Ok(docs)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn is_hidden(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(s) => s.to_str().map(|s| s.starts_with('.')).unwrap_or(false),
        _ => false,
    })
}

fn epoch_millis(time: SystemTime) -> i64 {
    chrono::DateTime::<chrono::Utc>::from(time).timestamp_millis()
}

#[async_trait]
impl Collection for FsCollection {
    async fn list_documents(&self) -> Result<Vec<DocumentStat>> {
        let this = self.clone();
        let docs = tokio::task::spawn_blocking(move || {
            let mut docs = Vec::new();
            let walker = WalkDir::new(&this.root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(error = %e, "skipping unreadable vault entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(key) = this.key_for(entry.path()) else {
                    continue;
                };
                match entry.metadata() {
                    Ok(meta) => docs.push(Self::stat_from(key, &meta)),
                    Err(e) => debug!(path = %key, error = %e, "cannot stat document"),
                }
            }
            docs.sort_by(|a, b| a.path.cmp(&b.path));
            docs
        })
        .await
        .context("vault scan task failed")?;

        Ok(docs)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("failed to read '{path}'"))
    }

    async fn stat(&self, path: &str) -> Result<Option<DocumentStat>> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(Some(Self::stat_from(path.to_string(), &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to stat '{path}'")),
        }
    }

    async fn metadata(&self, path: &str) -> Result<Option<DocumentMeta>> {
        if self.stat(path).await?.is_none() {
            return Ok(None);
        }
        let content = self.read(path).await?;
        Ok(Some(parse_metadata(&content)))
    }

    async fn backlinks(&self, path: &str) -> Result<Option<Vec<Backlink>>> {
        if self.stat(path).await?.is_none() {
            return Ok(None);
        }
        let docs = self.read_all().await?;
        Ok(Some(backlinks_to(
            path,
            docs.iter().map(|(p, c)| (p.as_str(), c.as_str())),
        )))
    }
}
