use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::markdown::{backlinks_to, parse_metadata};
use super::{Backlink, Collection, DocumentMeta, DocumentStat};

#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    created: i64,
    modified: i64,
}

/// A collection held entirely in memory.
///
/// Useful for hosts that already own their documents, and for tests that need
/// precise control over modification timestamps.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    docs: RwLock<BTreeMap<String, StoredDocument>>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(path, content)` pairs stamped with the current time.
    pub fn with_documents<I, P, C>(docs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let collection = Self::new();
        for (path, content) in docs {
            collection.upsert(path, content);
        }
        collection
    }

    /// Insert or replace a document, stamping it with the current time.
    pub fn upsert(&self, path: impl Into<String>, content: impl Into<String>) {
        let now = chrono::Utc::now().timestamp_millis();
        self.upsert_at(path, content, now);
    }

    /// Insert or replace a document with an explicit modification time.
    pub fn upsert_at(&self, path: impl Into<String>, content: impl Into<String>, modified: i64) {
        let mut docs = self.docs.write();
        let path = path.into();
        let created = docs.get(&path).map(|d| d.created).unwrap_or(modified);
        docs.insert(
            path,
            StoredDocument {
                content: content.into(),
                created,
                modified,
            },
        );
    }

    pub fn remove(&self, path: &str) -> bool {
        self.docs.write().remove(path).is_some()
    }

    pub fn rename(&self, from: &str, to: impl Into<String>) -> bool {
        let mut docs = self.docs.write();
        match docs.remove(from) {
            Some(doc) => {
                docs.insert(to.into(), doc);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn stat_of(path: &str, doc: &StoredDocument) -> DocumentStat {
        DocumentStat {
            path: path.to_string(),
            size: doc.content.len() as u64,
            created: doc.created,
            modified: doc.modified,
        }
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    async fn list_documents(&self) -> Result<Vec<DocumentStat>> {
        Ok(self
            .docs
            .read()
            .iter()
            .map(|(path, doc)| Self::stat_of(path, doc))
            .collect())
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.docs
            .read()
            .get(path)
            .map(|d| d.content.clone())
            .ok_or_else(|| anyhow!("document not found: {path}"))
    }

    async fn stat(&self, path: &str) -> Result<Option<DocumentStat>> {
        Ok(self.docs.read().get(path).map(|d| Self::stat_of(path, d)))
    }

    async fn metadata(&self, path: &str) -> Result<Option<DocumentMeta>> {
        Ok(self
            .docs
            .read()
            .get(path)
            .map(|d| parse_metadata(&d.content)))
    }

    async fn backlinks(&self, path: &str) -> Result<Option<Vec<Backlink>>> {
        let docs = self.docs.read();
        if !docs.contains_key(path) {
            return Ok(None);
        }
        let links = backlinks_to(
            path,
            docs.iter().map(|(p, d)| (p.as_str(), d.content.as_str())),
        );
        Ok(Some(links))
    }
}
