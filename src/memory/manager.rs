use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collection::{Collection, DocumentMeta};
use crate::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::providers::ProviderError;

use super::chunking::chunk_text;
use super::embeddings::{EmbeddingProvider, EMBEDDING_BATCH_SIZE};
use super::search::{rank, RetrievalRequest, RetrievalResponse};
use super::snapshot::{self, LoadOutcome, Snapshot};

// ---------------------------------------------------------------------------
// Index records
// ---------------------------------------------------------------------------

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

/// Everything the index holds for one document. Replaced wholesale on re-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunks: Vec<EmbeddedChunk>,
    /// Epoch milliseconds of the last successful indexing.
    pub indexed_at: i64,
}

/// Errors surfaced by index-wide operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("rebuild already in progress")]
    RebuildInProgress,

    #[error("failed to list documents: {0}")]
    Collection(String),

    #[error("failed to write index snapshot: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("failed to encode index snapshot: {0}")]
    SnapshotEncode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Settings and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub chunk_overlap: usize,
    /// Texts per embedding request.
    pub batch_size: usize,
    /// Where snapshots are written; `None` disables persistence.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            batch_size: EMBEDDING_BATCH_SIZE,
            snapshot_path: None,
        }
    }
}

/// Result of indexing a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Indexed { chunks: usize },
    /// Empty or whitespace-only content; nothing to embed. `removed` is set
    /// when this dropped an entry left over from earlier content.
    Skipped { removed: bool },
    Failed(String),
}

/// Emitted once per document during a rebuild.
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub path: String,
    pub completed: usize,
    pub total: usize,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub indexed: usize,
    pub removed: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.indexed > 0 || self.removed > 0 || self.failed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_chunks: usize,
    pub indexed: bool,
    pub indexing: bool,
    pub embedding_model: String,
}

/// Holds the `indexing` flag for the lifetime of a rebuild.
struct IndexingGuard<'a>(&'a AtomicBool);

impl<'a> IndexingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, IndexError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IndexError::RebuildInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for IndexingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// VectorIndex
// ---------------------------------------------------------------------------

/// In-memory semantic index over a document collection.
///
/// Maps each document path to its embedded chunks. Full rebuilds are mutually
/// exclusive through the `indexing` flag. [`VectorIndex::sync`] and the
/// debounced watcher path do not take that flag, so running them during a
/// rebuild can interleave writes to the same entry; the last writer wins.
pub struct VectorIndex {
    collection: Arc<dyn Collection>,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: IndexSettings,
    entries: RwLock<BTreeMap<String, IndexEntry>>,
    indexing: AtomicBool,
    indexed: AtomicBool,
    metadata_cache: Mutex<HashMap<String, Option<DocumentMeta>>>,
}

impl VectorIndex {
    pub fn new(
        collection: Arc<dyn Collection>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            collection,
            embedder,
            settings,
            entries: RwLock::new(BTreeMap::new()),
            indexing: AtomicBool::new(false),
            indexed: AtomicBool::new(false),
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed.load(Ordering::Acquire)
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn chunk_count(&self) -> usize {
        self.entries.read().values().map(|e| e.chunks.len()).sum()
    }

    pub fn entry(&self, path: &str) -> Option<IndexEntry> {
        self.entries.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn stats(&self) -> IndexStats {
        let entries = self.entries.read();
        IndexStats {
            total_files: entries.len(),
            total_chunks: entries.values().map(|e| e.chunks.len()).sum(),
            indexed: self.is_indexed(),
            indexing: self.is_indexing(),
            embedding_model: self.embedder.model_name().to_string(),
        }
    }

    // -- indexing -----------------------------------------------------------

    /// Chunk, embed, and store one document, replacing any previous entry.
    ///
    /// Empty documents and documents whose embedding fails lose their entry.
    pub async fn index_document(&self, path: &str) -> DocumentOutcome {
        let content = match self.collection.read(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path, error = %e, "failed to read document; skipping");
                self.entries.write().remove(path);
                return DocumentOutcome::Failed(format!("{e:#}"));
            }
        };

        let chunks = chunk_text(&content, self.settings.chunk_size, self.settings.chunk_overlap);
        if chunks.is_empty() {
            debug!(path, "document is empty; nothing to embed");
            let removed = self.entries.write().remove(path).is_some();
            if removed {
                self.metadata_cache.lock().remove(path);
                info!(path, "document emptied; entry removed");
            }
            return DocumentOutcome::Skipped { removed };
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.settings.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let result = match self.embedder.embed(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => Ok(vectors),
                Ok(vectors) => Err(ProviderError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))),
                Err(e) => Err(e),
            };

            match result {
                Ok(vectors) => {
                    embedded.extend(batch.iter().zip(vectors).map(|(chunk, embedding)| {
                        EmbeddedChunk {
                            text: chunk.text.clone(),
                            embedding,
                            start: chunk.start,
                            end: chunk.end,
                            index: chunk.index,
                        }
                    }));
                }
                Err(e) => {
                    warn!(path, error = %e, "embedding failed; document left out of the index");
                    self.entries.write().remove(path);
                    return DocumentOutcome::Failed(e.to_string());
                }
            }
        }

        let count = embedded.len();
        self.entries.write().insert(
            path.to_string(),
            IndexEntry {
                chunks: embedded,
                indexed_at: now_millis(),
            },
        );
        self.metadata_cache.lock().remove(path);
        self.indexed.store(true, Ordering::Release);

        debug!(path, chunks = count, "document indexed");
        DocumentOutcome::Indexed { chunks: count }
    }

    /// Re-index every document in the collection.
    pub async fn rebuild(&self) -> Result<RebuildReport, IndexError> {
        self.rebuild_with_progress(|_| {}).await
    }

    /// Re-index every document, reporting progress after each one.
    ///
    /// Rejects with [`IndexError::RebuildInProgress`] while another rebuild
    /// runs. Per-document failures are counted, never fatal.
    pub async fn rebuild_with_progress<F>(&self, on_progress: F) -> Result<RebuildReport, IndexError>
    where
        F: Fn(&IndexProgress) + Send + Sync,
    {
        let _guard = IndexingGuard::acquire(&self.indexing)?;

        let docs = self
            .collection
            .list_documents()
            .await
            .map_err(|e| IndexError::Collection(format!("{e:#}")))?;

        info!(documents = docs.len(), "index rebuild started");

        let mut report = RebuildReport {
            total: docs.len(),
            ..Default::default()
        };

        for (i, doc) in docs.iter().enumerate() {
            let outcome = self.index_document(&doc.path).await;
            match &outcome {
                DocumentOutcome::Indexed { .. } => report.succeeded += 1,
                DocumentOutcome::Skipped { .. } => report.skipped += 1,
                DocumentOutcome::Failed(_) => report.failed += 1,
            }
            on_progress(&IndexProgress {
                path: doc.path.clone(),
                completed: i + 1,
                total: docs.len(),
                outcome,
            });
        }

        let live: HashSet<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|path, _| live.contains(path.as_str()));
            report.removed = before - entries.len();
        }

        self.indexed.store(report.succeeded > 0, Ordering::Release);

        if report.succeeded > 0 {
            if let Err(e) = self.persist().await {
                warn!(error = %e, "failed to persist index snapshot");
            }
        }

        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            removed = report.removed,
            "index rebuild finished"
        );
        Ok(report)
    }

    /// Bring the index in line with the collection without a full rebuild.
    ///
    /// New documents and documents modified after their `indexed_at` are
    /// re-indexed; entries whose document disappeared are dropped.
    pub async fn sync(&self) -> Result<SyncReport, IndexError> {
        let docs = self
            .collection
            .list_documents()
            .await
            .map_err(|e| IndexError::Collection(format!("{e:#}")))?;

        let live: HashSet<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        let (scheduled, gone): (Vec<&str>, Vec<String>) = {
            let entries = self.entries.read();
            let scheduled = docs
                .iter()
                .filter(|d| {
                    entries
                        .get(&d.path)
                        .map(|e| d.modified > e.indexed_at)
                        .unwrap_or(true)
                })
                .map(|d| d.path.as_str())
                .collect();
            let gone = entries
                .keys()
                .filter(|p| !live.contains(p.as_str()))
                .cloned()
                .collect();
            (scheduled, gone)
        };

        let mut report = SyncReport {
            unchanged: docs.len() - scheduled.len(),
            ..Default::default()
        };

        {
            let mut entries = self.entries.write();
            for path in &gone {
                if entries.remove(path).is_some() {
                    report.removed += 1;
                }
            }
        }

        for path in scheduled {
            match self.index_document(path).await {
                DocumentOutcome::Indexed { .. } => report.indexed += 1,
                DocumentOutcome::Skipped { removed: true } => report.removed += 1,
                DocumentOutcome::Skipped { removed: false } => report.unchanged += 1,
                DocumentOutcome::Failed(_) => report.failed += 1,
            }
        }

        if report.changed() {
            self.persist().await?;
        }

        info!(
            indexed = report.indexed,
            removed = report.removed,
            failed = report.failed,
            unchanged = report.unchanged,
            "index sync finished"
        );
        Ok(report)
    }

    /// Re-index specific documents; paths that no longer exist are dropped.
    pub async fn index_paths(&self, paths: &[String]) -> Result<SyncReport, IndexError> {
        let mut report = SyncReport::default();
        let mut seen = HashSet::new();

        for path in paths {
            if !seen.insert(path.as_str()) {
                continue;
            }
            match self.collection.stat(path).await {
                Ok(Some(_)) => match self.index_document(path).await {
                    DocumentOutcome::Indexed { .. } => report.indexed += 1,
                    DocumentOutcome::Skipped { removed: true } => report.removed += 1,
                    DocumentOutcome::Skipped { removed: false } => report.unchanged += 1,
                    DocumentOutcome::Failed(_) => report.failed += 1,
                },
                Ok(None) => {
                    if self.remove_document(path) {
                        report.removed += 1;
                    }
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to stat document");
                    report.failed += 1;
                }
            }
        }

        if report.changed() {
            self.persist().await?;
        }
        Ok(report)
    }

    /// Drop a document's entry. Returns whether one existed.
    pub fn remove_document(&self, path: &str) -> bool {
        self.metadata_cache.lock().remove(path);
        self.entries.write().remove(path).is_some()
    }

    /// Move an entry to a new key without re-embedding.
    ///
    /// Returns `false` when `from` has no entry.
    pub fn rename_document(&self, from: &str, to: &str) -> bool {
        {
            let mut cache = self.metadata_cache.lock();
            cache.remove(from);
            cache.remove(to);
        }
        let mut entries = self.entries.write();
        match entries.remove(from) {
            Some(entry) => {
                entries.insert(to.to_string(), entry);
                true
            }
            None => false,
        }
    }

    // -- retrieval ----------------------------------------------------------

    /// Semantic search over the indexed chunks.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse, ProviderError> {
        if !self.is_indexed() {
            return Ok(RetrievalResponse::not_ready());
        }

        let query_embedding = self.embedder.embed_one(&request.query).await?;

        let entries = self.entries.read();
        let hits = if request.within_paths.is_empty() {
            rank(
                &query_embedding,
                entries.iter().map(|(p, e)| (p.as_str(), e.chunks.as_slice())),
                request,
            )
        } else {
            rank(
                &query_embedding,
                request
                    .within_paths
                    .iter()
                    .filter_map(|p| entries.get_key_value(p))
                    .map(|(p, e)| (p.as_str(), e.chunks.as_slice())),
                request,
            )
        };
        drop(entries);

        debug!(query = %request.query, hits = hits.len(), "retrieval finished");
        Ok(RetrievalResponse::hits(request.query.clone(), hits))
    }

    // -- metadata cache -----------------------------------------------------

    /// Collection metadata for `path`, memoized until the cache is cleared.
    pub async fn cached_metadata(&self, path: &str) -> Option<DocumentMeta> {
        let cached = self.metadata_cache.lock().get(path).cloned();
        if let Some(hit) = cached {
            return hit;
        }

        let meta = match self.collection.metadata(path).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path, error = %e, "metadata lookup failed");
                None
            }
        };
        self.metadata_cache
            .lock()
            .insert(path.to_string(), meta.clone());
        meta
    }

    pub fn clear_metadata_cache(&self) {
        self.metadata_cache.lock().clear();
    }

    // -- persistence --------------------------------------------------------

    /// Write the whole index to the snapshot file, if one is configured.
    pub async fn persist(&self) -> Result<(), IndexError> {
        let Some(path) = &self.settings.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot::from_entries(&self.entries.read(), now_millis());
        snapshot::write_snapshot(path, &snapshot).await
    }

    /// Replace the index contents with the snapshot on disk.
    ///
    /// A successful load marks the index ready even when the snapshot holds
    /// no documents.
    pub async fn load_snapshot(&self) -> LoadOutcome {
        let Some(path) = &self.settings.snapshot_path else {
            return LoadOutcome::Missing;
        };

        match snapshot::read_snapshot(path).await {
            Ok(Some(snapshot)) => {
                let entries = snapshot.into_entries();
                let documents = entries.len();
                let chunks = entries.values().map(|e| e.chunks.len()).sum();
                if documents == 0 {
                    warn!(path = %path.display(), "loaded an empty index snapshot; index reports ready with no documents");
                }
                *self.entries.write() = entries;
                self.indexed.store(true, Ordering::Release);
                info!(documents, chunks, "index snapshot loaded");
                LoadOutcome::Loaded { documents, chunks }
            }
            Ok(None) => {
                debug!(path = %path.display(), "no index snapshot found");
                LoadOutcome::Missing
            }
            Err(reason) => {
                warn!(path = %path.display(), error = %reason, "failed to load index snapshot");
                LoadOutcome::Failed(reason)
            }
        }
    }
}
