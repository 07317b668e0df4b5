//! Document collections the agent can read and index.
//!
//! A collection is keyed by `/`-separated relative paths. The index keeps only
//! shadow records of documents; the collection stays the source of truth for
//! content, timestamps, and metadata.

mod fs;
pub mod markdown;
mod memory;
pub mod watch;

pub use fs::FsCollection;
pub use memory::InMemoryCollection;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Size and timestamps of one document. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStat {
    pub path: String,
    pub size: u64,
    pub created: i64,
    pub modified: i64,
}

impl DocumentStat {
    /// File name component of the path.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Metadata a collection exposes for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Parsed front-matter, if the document has any.
    pub frontmatter: Option<serde_json::Value>,
    /// Inline `#tag` references, without the leading `#`, one per occurrence.
    pub inline_tags: Vec<String>,
    /// Tags listed in the front-matter `tags` field, without a leading `#`.
    pub frontmatter_tags: Vec<String>,
}

impl DocumentMeta {
    /// Inline and front-matter tags together.
    pub fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.inline_tags
            .iter()
            .chain(self.frontmatter_tags.iter())
            .map(String::as_str)
    }
}

/// A document that links to another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlink {
    pub from_path: String,
    pub count: usize,
}

/// Change notification emitted by a live collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    Created(String),
    Modified(String),
    Deleted(String),
    Renamed { from: String, to: String },
}

/// Read access to a document collection.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Every document currently in the collection.
    async fn list_documents(&self) -> Result<Vec<DocumentStat>>;

    /// Full text of a document.
    async fn read(&self, path: &str) -> Result<String>;

    /// Stat one document, `None` if it does not exist.
    async fn stat(&self, path: &str) -> Result<Option<DocumentStat>>;

    /// Front-matter and tags of a document, `None` if it does not exist.
    async fn metadata(&self, path: &str) -> Result<Option<DocumentMeta>>;

    /// Documents linking to `path`, `None` if `path` does not exist.
    async fn backlinks(&self, path: &str) -> Result<Option<Vec<Backlink>>>;

    async fn exists(&self, path: &str) -> bool {
        matches!(self.stat(path).await, Ok(Some(_)))
    }
}
