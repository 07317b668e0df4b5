/// Default configuration constants used across the system.

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Maximum completion requests in one user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Default chunk window in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Quiet period before queued document updates are indexed (30 s).
pub const DEFAULT_DEBOUNCE_MS: u64 = 30_000;

/// Snapshot file name under the state directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "index.json";

/// Default number of retrieval hits.
pub const DEFAULT_RETRIEVAL_K: usize = 8;

/// Default per-document cap on retrieval hits.
pub const DEFAULT_MAX_CHUNKS_PER_FILE: usize = 2;

/// Default minimum cosine similarity for a retrieval hit.
pub const DEFAULT_MIN_SCORE: f64 = 0.3;

/// Default page size for document enumeration.
pub const DEFAULT_LIST_LIMIT: usize = 200;

/// Default character budget for batch reads.
pub const DEFAULT_MAX_TOTAL_CHARS: usize = 50_000;

/// API keys must start with this prefix.
pub const API_KEY_PREFIX: &str = "sk-";
pub const API_KEY_MIN_LEN: usize = 40;
pub const API_KEY_MAX_LEN: usize = 200;

/// USD per million tokens for the default model.
pub const DEFAULT_PRICE_CACHED_INPUT: f64 = 0.005;
pub const DEFAULT_PRICE_INPUT: f64 = 0.05;
pub const DEFAULT_PRICE_OUTPUT: f64 = 0.40;
pub const DEFAULT_PRICE_EMBEDDING: f64 = 0.02;
