use super::defaults::{API_KEY_MAX_LEN, API_KEY_MIN_LEN, API_KEY_PREFIX};
use super::Config;
use anyhow::Result;
use tracing::warn;

/// Problems that stop the agent before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no OpenAI API key configured; set `openai.apiKey` in the config file or OPENAI_API_KEY")]
    MissingApiKey,

    #[error("malformed OpenAI API key: {0}")]
    MalformedApiKey(String),

    #[error("`{0}` must name a model")]
    MissingModel(&'static str),
}

/// Check the shape of an API key without contacting the service.
pub fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::MissingApiKey);
    }
    if !key.starts_with(API_KEY_PREFIX) {
        return Err(ConfigError::MalformedApiKey(format!(
            "expected it to start with `{API_KEY_PREFIX}`"
        )));
    }
    if key.len() < API_KEY_MIN_LEN || key.len() > API_KEY_MAX_LEN {
        return Err(ConfigError::MalformedApiKey(format!(
            "expected {API_KEY_MIN_LEN}-{API_KEY_MAX_LEN} characters, got {}",
            key.len()
        )));
    }
    Ok(())
}

/// Everything needed to talk to the remote endpoints, checked up front.
pub fn validate_credentials(config: &Config) -> Result<String, ConfigError> {
    if config.agent.model.trim().is_empty() {
        return Err(ConfigError::MissingModel("agent.model"));
    }
    if config.embedding.model.trim().is_empty() {
        return Err(ConfigError::MissingModel("embedding.model"));
    }
    let key = config
        .openai
        .api_key
        .as_deref()
        .ok_or(ConfigError::MissingApiKey)?;
    validate_api_key(key)?;
    Ok(key.trim().to_string())
}

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    let mut push = |path: &str, message: &str| {
        errors.push(ConfigValidationError {
            path: path.to_string(),
            message: message.to_string(),
        })
    };

    if config.agent.max_iterations == 0 {
        push("agent.maxIterations", "Must be at least 1");
    }
    if config.index.chunk_size == 0 {
        push("index.chunkSize", "Must be greater than 0");
    }
    if config.index.chunk_overlap >= config.index.chunk_size {
        warn!(
            chunk_size = config.index.chunk_size,
            chunk_overlap = config.index.chunk_overlap,
            "index.chunkOverlap is not smaller than index.chunkSize; it will be clamped to half the size"
        );
    }
    if config.embedding.batch_size == 0 {
        push("embedding.batchSize", "Must be greater than 0");
    }
    if config.retrieval.k == 0 {
        push("retrieval.k", "Must be greater than 0");
    }
    if config.retrieval.max_chunks_per_file == 0 {
        push("retrieval.maxChunksPerFile", "Must be greater than 0");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.min_score) {
        push("retrieval.minScore", "Must be between -1 and 1");
    }
    if config.openai.base_url.trim().is_empty() {
        push("openai.baseUrl", "Base URL is required");
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
