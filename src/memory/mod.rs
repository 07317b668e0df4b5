mod chunking;
mod embeddings;
mod manager;
mod search;
mod snapshot;
mod watcher;

pub use chunking::{chunk_text, TextChunk};
pub use embeddings::{
    truncate_for_embedding, EmbeddingProvider, OpenAiEmbeddingProvider, EMBEDDING_BATCH_SIZE,
    MAX_EMBEDDING_INPUT_CHARS,
};
pub use manager::{
    DocumentOutcome, EmbeddedChunk, IndexEntry, IndexError, IndexProgress, IndexSettings,
    IndexStats, RebuildReport, SyncReport, VectorIndex,
};
pub use search::{
    cap_per_source, cosine_similarity, mmr_order, rank, Candidate, RetrievalHit, RetrievalRequest,
    RetrievalResponse, MMR_LAMBDA, MMR_OVERSAMPLE,
};
pub use snapshot::{read_snapshot, write_snapshot, LoadOutcome, Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
pub use watcher::IndexWatcher;
