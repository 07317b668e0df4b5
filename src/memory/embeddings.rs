use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL};
use crate::providers::ProviderError;

/// Inputs longer than this many characters are cut before embedding.
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 30_000;

/// Upper bound on texts sent in one embedding request.
pub const EMBEDDING_BATCH_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A provider that turns text into dense vector embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embeddings for a batch of texts.
    ///
    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// The model identifier used by this provider (e.g. `text-embedding-3-small`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))
    }
}

/// Cut `text` to [`MAX_EMBEDDING_INPUT_CHARS`] characters.
pub fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBEDDING_INPUT_CHARS) {
        Some((byte_idx, _)) => {
            warn!(
                chars = text.chars().count(),
                limit = MAX_EMBEDDING_INPUT_CHARS,
                "embedding input truncated"
            );
            &text[..byte_idx]
        }
        None => text,
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// Calls the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = OpenAiEmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|t| truncate_for_embedding(t)).collect(),
            encoding_format: "float",
        };

        debug!(model = %self.model, inputs = texts.len(), "requesting embeddings");

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(resp).await);
        }

        let parsed: OpenAiEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_leaves_short_text() {
        assert_eq!(truncate_for_embedding("short"), "short");
    }

    #[test]
    fn test_truncate_long_text_on_char_boundary() {
        let text = "ß".repeat(MAX_EMBEDDING_INPUT_CHARS + 10);
        let cut = truncate_for_embedding(&text);
        assert_eq!(cut.chars().count(), MAX_EMBEDDING_INPUT_CHARS);
    }

    #[test]
    fn test_openai_defaults() {
        let provider = OpenAiEmbeddingProvider::new("sk-test".into(), None, None);
        assert_eq!(provider.model_name(), "text-embedding-3-small");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }
}
