//! On-disk snapshot of the vector index.
//!
//! The snapshot is a single JSON document rewritten wholesale on every
//! persist. Writes go to a sibling temp file first and are renamed into place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::manager::{EmbeddedChunk, IndexEntry, IndexError};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Epoch milliseconds when the snapshot was written.
    pub indexed_at: i64,
    pub embeddings: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: String,
    pub chunks: Vec<EmbeddedChunk>,
    pub indexed_at: i64,
}

/// What happened when loading a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot file (or persistence disabled). Not an error.
    Missing,
    Loaded { documents: usize, chunks: usize },
    /// The file exists but could not be used; the index is left untouched.
    Failed(String),
}

impl Snapshot {
    pub fn from_entries(entries: &BTreeMap<String, IndexEntry>, indexed_at: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            indexed_at,
            embeddings: entries
                .iter()
                .map(|(path, entry)| SnapshotEntry {
                    path: path.clone(),
                    chunks: entry.chunks.clone(),
                    indexed_at: entry.indexed_at,
                })
                .collect(),
        }
    }

    pub fn into_entries(self) -> BTreeMap<String, IndexEntry> {
        self.embeddings
            .into_iter()
            .map(|e| {
                (
                    e.path,
                    IndexEntry {
                        chunks: e.chunks,
                        indexed_at: e.indexed_at,
                    },
                )
            })
            .collect()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = serde_json::to_vec(snapshot)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(
        path = %path.display(),
        documents = snapshot.embeddings.len(),
        bytes = bytes.len(),
        "index snapshot written"
    );
    Ok(())
}

/// Read a snapshot. `Ok(None)` when the file does not exist; `Err` carries a
/// human-readable reason for unreadable, malformed, or wrong-version files.
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, String> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("cannot read snapshot: {e}")),
    };

    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|e| format!("malformed snapshot: {e}"))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        ));
    }

    Ok(Some(snapshot))
}
