mod client;
mod error;
mod openai;

pub use client::{CompletionClient, CompletionSettings};
pub use error::ProviderError;
pub use openai::OpenAiResponsesProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

// ============================================================================
// Request Types
// ============================================================================

/// One item of the `input` array of a Responses-API request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message { role: String, content: String },
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn system(content: impl Into<String>) -> Self {
        InputItem::Message {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        InputItem::Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Result of one tool call, threaded back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningOptions {
    pub effort: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextOptions {
    pub verbosity: String,
}

/// A request to a Responses-API style endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    pub tools: Vec<Value>,
    pub parallel_tool_calls: bool,
    pub reasoning: ReasoningOptions,
    pub text: TextOptions,
    pub store: bool,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

/// Raw response body. Output items are kept loosely typed because the
/// endpoint mixes several item shapes in one array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub output: Vec<Value>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u64,
}

impl ResponseUsage {
    pub fn cached_tokens(&self) -> u64 {
        self.input_tokens_details
            .as_ref()
            .map(|d| d.cached_tokens)
            .unwrap_or(0)
    }

    pub fn reasoning_tokens(&self) -> u64 {
        self.output_tokens_details
            .as_ref()
            .map(|d| d.reasoning_tokens)
            .unwrap_or(0)
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    /// Decoded arguments, or the reason they could not be decoded. A call
    /// with broken arguments is kept so that its `call_id` still gets an
    /// output.
    pub arguments: Result<Value, String>,
}

/// Text and tool calls extracted from a [`ResponseBody`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

fn is_call_item(kind: &str) -> bool {
    kind == "function_call" || kind == "tool_call"
}

/// Build a [`ToolCall`] from a `function_call` item or content part.
///
/// Items without an id or name cannot be answered and are dropped with an
/// error log. Arguments that are not valid JSON are kept as an error.
fn tool_call_from(item: &Value) -> Option<ToolCall> {
    let call_id = item
        .get("call_id")
        .and_then(Value::as_str)
        .or_else(|| item.get("id").and_then(Value::as_str))
        .filter(|id| !id.is_empty());
    let name = item.get("name").and_then(Value::as_str).filter(|n| !n.is_empty());

    let (Some(call_id), Some(name)) = (call_id, name) else {
        error!(item = %item, "tool call without id or name; dropping it");
        return None;
    };

    let arguments = match item.get("arguments") {
        None | Some(Value::Null) => Ok(Value::Object(Default::default())),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(Value::Object(Default::default())),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|e| {
            error!(tool = name, call_id, error = %e, "tool call arguments are not valid JSON");
            format!("invalid arguments: {e}")
        }),
        Some(other) => Ok(other.clone()),
    };

    Some(ToolCall {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

/// Extract text and tool calls from the `output` array of a response.
pub fn parse_response(body: &ResponseBody) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();

    for item in &body.output {
        let kind = item.get("type").and_then(Value::as_str).unwrap_or("");
        if kind == "message" {
            let Some(parts) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for part in parts {
                let part_kind = part.get("type").and_then(Value::as_str).unwrap_or("");
                if part_kind == "output_text" || part_kind == "text" {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        parsed.text.push_str(text);
                    }
                } else if is_call_item(part_kind) {
                    parsed.tool_calls.extend(tool_call_from(part));
                }
            }
        } else if is_call_item(kind) {
            parsed.tool_calls.extend(tool_call_from(item));
        }
    }

    parsed
}

// ============================================================================
// Provider Trait
// ============================================================================

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseBody, ProviderError>;
    fn name(&self) -> &str;
}
