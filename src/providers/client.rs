use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{AgentConfig, ReasoningEffort, TextVerbosity};

use super::{
    CompletionProvider, InputItem, ProviderError, ReasoningOptions, ResponseBody, ResponseRequest,
    TextOptions, ToolOutput,
};

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub text_verbosity: TextVerbosity,
}

impl From<&AgentConfig> for CompletionSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            reasoning_effort: config.reasoning_effort,
            text_verbosity: config.text_verbosity,
        }
    }
}

/// Completion endpoint wrapper that threads conversation state.
///
/// Each successful response id becomes the `previous_response_id` of the next
/// request, so follow-ups only carry new input items.
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    settings: CompletionSettings,
    previous_response_id: Option<String>,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: CompletionSettings) -> Self {
        Self {
            provider,
            settings,
            previous_response_id: None,
        }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }

    /// Forget the conversation thread.
    pub fn reset(&mut self) {
        self.previous_response_id = None;
    }

    /// Send input items, continuing the current thread if there is one.
    pub async fn send(&mut self, input: Vec<InputItem>, tools: &[Value]) -> Result<ResponseBody, ProviderError> {
        let request = ResponseRequest {
            model: self.settings.model.clone(),
            input,
            tools: tools.to_vec(),
            parallel_tool_calls: true,
            reasoning: ReasoningOptions {
                effort: self.settings.reasoning_effort.to_string(),
            },
            text: TextOptions {
                verbosity: self.settings.text_verbosity.to_string(),
            },
            store: true,
            stream: false,
            previous_response_id: self.previous_response_id.clone(),
        };

        debug!(
            provider = self.provider.name(),
            model = %request.model,
            items = request.input.len(),
            previous = ?request.previous_response_id,
            "sending completion request"
        );

        let body = self.provider.create_response(&request).await?;
        if !body.id.is_empty() {
            self.previous_response_id = Some(body.id.clone());
        }
        Ok(body)
    }

    /// Thread every tool output back to the model in one request.
    ///
    /// Every output must carry the `call_id` of the call it answers.
    pub async fn submit_tool_outputs(
        &mut self,
        outputs: Vec<ToolOutput>,
        tools: &[Value],
    ) -> Result<ResponseBody, ProviderError> {
        if outputs.iter().any(|o| o.call_id.trim().is_empty()) {
            return Err(ProviderError::InvalidRequest(
                "function_call_output is missing its call_id".to_string(),
            ));
        }

        let input = outputs
            .into_iter()
            .map(|o| InputItem::FunctionCallOutput {
                call_id: o.call_id,
                output: o.output.to_string(),
            })
            .collect();
        self.send(input, tools).await
    }
}
