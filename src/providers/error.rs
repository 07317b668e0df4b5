use reqwest::StatusCode;

/// Failure talking to a remote model endpoint (completions or embeddings).
///
/// Every HTTP-level variant keeps the raw status so callers can branch on it,
/// and its `Display` text tells a human what to do next. Nothing here is
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unauthorized (HTTP {status}): the API key was rejected; check `openai.apiKey` or OPENAI_API_KEY")]
    Unauthorized { status: u16, body: String },

    #[error("rate limited (HTTP {status}): slow down or check your plan quota{}", retry_hint(.retry_after_secs))]
    RateLimited {
        status: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },

    #[error("service error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    #[error("transport error: {0}; check network connectivity and `openai.baseUrl`")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response from endpoint: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl ProviderError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: String, retry_after_secs: Option<u64>) -> Self {
        let code = status.as_u16();
        match code {
            401 => ProviderError::Unauthorized { status: code, body },
            429 => ProviderError::RateLimited {
                status: code,
                body,
                retry_after_secs,
            },
            403 => ProviderError::ServiceError {
                status: code,
                message: format!(
                    "access forbidden; the key may lack permission for this model or endpoint: {}",
                    summarize_body(&body)
                ),
            },
            _ => ProviderError::ServiceError {
                status: code,
                message: summarize_body(&body),
            },
        }
    }

    /// Read status, `Retry-After` and body from a failed response.
    pub async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();
        Self::from_status(status, body, retry_after_secs)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Unauthorized { status, .. }
            | ProviderError::RateLimited { status, .. }
            | ProviderError::ServiceError { status, .. } => Some(*status),
            ProviderError::Transport(e) => e.status().map(|s| s.as_u16()),
            ProviderError::InvalidResponse(_) | ProviderError::InvalidRequest(_) => None,
        }
    }
}

/// Prefer the `error.message` field of an OpenAI-style error body.
fn summarize_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        })
}
