use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::defaults::*;

// ============================================================================
// OpenAI
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextVerbosity {
    Low,
    #[default]
    Medium,
    High,
}

impl TextVerbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextVerbosity::Low => "low",
            TextVerbosity::Medium => "medium",
            TextVerbosity::High => "high",
        }
    }
}

impl fmt::Display for TextVerbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-million-token prices in USD, used for the usage cost estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingConfig {
    pub cached_input: f64,
    pub input: f64,
    pub output: f64,
    pub embedding: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cached_input: DEFAULT_PRICE_CACHED_INPUT,
            input: DEFAULT_PRICE_INPUT,
            output: DEFAULT_PRICE_OUTPUT,
            embedding: DEFAULT_PRICE_EMBEDDING,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub text_verbosity: TextVerbosity,
    pub max_iterations: u32,
    /// Text file replacing the built-in tool policy prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_policy_prompt: Option<PathBuf>,
    /// Text file replacing the built-in completion criteria prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_prompt: Option<PathBuf>,
    pub pricing: PricingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            reasoning_effort: ReasoningEffort::default(),
            text_verbosity: TextVerbosity::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_policy_prompt: None,
            completion_prompt: None,
            pricing: PricingConfig::default(),
        }
    }
}

// ============================================================================
// Embeddings / index / retrieval
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: crate::memory::EMBEDDING_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub debounce_ms: u64,
    /// Snapshot location; relative paths resolve against the state directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            snapshot_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    pub k: usize,
    pub max_chunks_per_file: usize,
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RETRIEVAL_K,
            max_chunks_per_file: DEFAULT_MAX_CHUNKS_PER_FILE,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LoggingLevel,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}
