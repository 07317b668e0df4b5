use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::DEFAULT_OPENAI_BASE_URL;

use super::{CompletionProvider, ProviderError, ResponseBody, ResponseRequest};

/// Calls the OpenAI `/responses` endpoint.
pub struct OpenAiResponsesProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiResponsesProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: Client::new(),
        }
    }
}

// ============================================================================
// CompletionProvider Implementation
// ============================================================================

#[async_trait]
impl CompletionProvider for OpenAiResponsesProvider {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseBody, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(resp).await);
        }

        let body: ResponseBody = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(
            response_id = %body.id,
            items = body.output.len(),
            "completion response received"
        );
        Ok(body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
