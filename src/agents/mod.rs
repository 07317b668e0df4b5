pub mod approval;
pub mod context;
pub mod tools;
mod usage;

pub use approval::{ApprovalProvider, ConsoleApproval, DenyAll, REQUEST_APPROVAL};
pub use context::ContextBuilder;
pub use usage::{embedding_cost, UsageTotals};

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::hooks::{HookEvent, HookRegistry};
use crate::providers::{
    parse_response, CompletionClient, InputItem, ProviderError, ToolCall, ToolOutput,
};

use tools::{ToolKind, ToolRegistry};

// ============================================================================
// Agent Runtime
// ============================================================================

/// Where the loop currently is. Transitions are logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running(u32),
    AwaitingModel,
    ExecutingTools,
    AwaitingApproval,
    Done,
    Failed,
}

/// Reasons a turn ends without an answer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model stopped without calling output_to_user or providing text")]
    NoOutput,

    #[error("agent reached maximum iterations ({0})")]
    MaxIterations(u32),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AgentError {
    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            AgentError::NoOutput => "Rephrase the request, or try a model with stronger tool use.",
            AgentError::MaxIterations(_) => {
                "Narrow the question, or raise `agent.maxIterations` in the config."
            }
            AgentError::Provider(e) => match e {
                ProviderError::Unauthorized { .. } => "Check `openai.apiKey` or OPENAI_API_KEY.",
                ProviderError::RateLimited { .. } => {
                    "Wait a moment and retry, or check your plan quota."
                }
                ProviderError::ServiceError { .. } => {
                    "The endpoint reported an error; retry later or check `agent.model`."
                }
                ProviderError::Transport(_) => "Check network connectivity and `openai.baseUrl`.",
                ProviderError::InvalidResponse(_) | ProviderError::InvalidRequest(_) => {
                    "Rerun with RUST_LOG=vault_agent=debug to see the exchanged payloads."
                }
            },
        }
    }
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// `implicit` is set when the model answered in plain text instead of
    /// calling `output_to_user`.
    Completed { final_output: String, implicit: bool },
    Failed { error: AgentError },
}

/// Result of one user turn.
#[derive(Debug)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Completion requests made; the first request is iteration 1.
    pub iterations: u32,
    pub usage: UsageTotals,
}

impl TurnReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed { .. })
    }

    pub fn final_output(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Completed { final_output, .. } => Some(final_output),
            TurnOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&AgentError> {
        match &self.outcome {
            TurnOutcome::Failed { error } => Some(error),
            TurnOutcome::Completed { .. } => None,
        }
    }
}

/// Drives one user turn: request, run the tool calls, thread the outputs
/// back, repeat until the model calls `output_to_user` or a limit is hit.
pub struct AgentLoop<'a> {
    client: &'a mut CompletionClient,
    tools: &'a ToolRegistry,
    hooks: &'a HookRegistry,
    approval: Option<&'a dyn ApprovalProvider>,
    max_iterations: u32,
    state: LoopState,
    iteration: u32,
    usage: UsageTotals,
    final_output: Option<String>,
}

impl<'a> AgentLoop<'a> {
    pub fn new(client: &'a mut CompletionClient, tools: &'a ToolRegistry, hooks: &'a HookRegistry) -> Self {
        Self {
            client,
            tools,
            hooks,
            approval: None,
            max_iterations: crate::config::DEFAULT_MAX_ITERATIONS,
            state: LoopState::Running(0),
            iteration: 0,
            usage: UsageTotals::default(),
            final_output: None,
        }
    }

    /// Advertise `request_approval` and route its calls to `provider`.
    pub fn with_approval(mut self, provider: Option<&'a dyn ApprovalProvider>) -> Self {
        self.approval = provider;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the turn to completion. Never panics; failures end up in the report.
    pub async fn run(mut self, system: Vec<InputItem>, user_message: &str) -> TurnReport {
        let outcome = match self.drive(system, user_message).await {
            Ok((final_output, implicit)) => {
                self.transition(LoopState::Done);
                info!(iterations = self.iteration, implicit, "agent turn completed");
                TurnOutcome::Completed {
                    final_output,
                    implicit,
                }
            }
            Err(error) => {
                self.transition(LoopState::Failed);
                error!(iterations = self.iteration, error = %error, "agent turn failed");
                TurnOutcome::Failed { error }
            }
        };

        self.hooks.emit(HookEvent::TurnFinished {
            iterations: self.iteration,
            success: matches!(outcome, TurnOutcome::Completed { .. }),
        });

        TurnReport {
            outcome,
            iterations: self.iteration,
            usage: self.usage,
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "agent loop transition");
        self.state = next;
    }

    fn schemas(&self) -> Vec<Value> {
        let mut schemas = self.tools.schemas();
        if self.approval.is_some() {
            schemas.push(approval::approval_schema());
        }
        schemas
    }

    async fn drive(&mut self, system: Vec<InputItem>, user_message: &str) -> Result<(String, bool), AgentError> {
        let schemas = self.schemas();
        let mut input = system;
        input.push(InputItem::user(user_message));

        self.iteration = 1;
        self.transition(LoopState::Running(self.iteration));
        self.transition(LoopState::AwaitingModel);
        let mut response = self.client.send(input, &schemas).await?;

        loop {
            self.usage.add(response.usage.as_ref());
            let parsed = parse_response(&response);

            if parsed.tool_calls.is_empty() {
                if parsed.text.trim().is_empty() {
                    return Err(AgentError::NoOutput);
                }
                warn!(
                    iteration = self.iteration,
                    "model answered in free text without calling output_to_user"
                );
                return Ok((parsed.text, true));
            }

            if !parsed.text.trim().is_empty() {
                self.hooks.emit(HookEvent::AssistantUpdate {
                    text: parsed.text.clone(),
                });
            }

            self.transition(LoopState::ExecutingTools);
            let outputs = self.execute_tool_calls(&parsed.tool_calls).await;

            if let Some(final_output) = self.final_output.take() {
                return Ok((final_output, false));
            }
            if self.iteration >= self.max_iterations {
                return Err(AgentError::MaxIterations(self.max_iterations));
            }

            self.iteration += 1;
            self.transition(LoopState::Running(self.iteration));
            self.transition(LoopState::AwaitingModel);
            response = self.client.submit_tool_outputs(outputs, &schemas).await?;
        }
    }

    /// Run a batch of calls in order. Every call yields exactly one output.
    async fn execute_tool_calls(&mut self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());

        for call in calls {
            self.hooks.emit(HookEvent::ToolCallStarted {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone().unwrap_or(Value::Null),
            });

            let result = match (&call.arguments, self.approval) {
                (Err(reason), _) => {
                    warn!(tool = %call.name, call_id = %call.call_id, "answering tool call with an argument error");
                    json!({ "error": reason, "tool": call.name })
                }
                (Ok(arguments), Some(provider)) if call.name == REQUEST_APPROVAL => {
                    self.request_approval(provider, arguments).await
                }
                (Ok(arguments), _) => self.tools.execute(&call.name, arguments).await,
            };

            let terminal = ToolKind::from_name(&call.name).is_some_and(|k| k.is_terminal());
            if terminal && result.get("final_output") == Some(&Value::Bool(true)) {
                if let Some(message) = result.get("message").and_then(Value::as_str) {
                    self.final_output = Some(message.to_string());
                }
            }

            self.hooks.emit(HookEvent::ToolCallFinished {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                result: result.clone(),
            });
            outputs.push(ToolOutput {
                call_id: call.call_id.clone(),
                output: result,
            });
        }

        outputs
    }

    async fn request_approval(&mut self, provider: &dyn ApprovalProvider, arguments: &Value) -> Value {
        let details = arguments
            .get("operation_details")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.transition(LoopState::AwaitingApproval);
        self.hooks.emit(HookEvent::ApprovalRequested {
            details: details.clone(),
        });
        let approved = provider.approve(&details).await;
        info!(approved, "approval decision");
        self.transition(LoopState::ExecutingTools);

        approval::approval_result(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::InMemoryCollection;
    use crate::config::{ReasoningEffort, TextVerbosity};
    use crate::memory::{EmbeddingProvider, IndexSettings, VectorIndex};
    use crate::providers::{CompletionProvider, CompletionSettings, ResponseBody, ResponseRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tools::{ToolContext, ToolDefaults};

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NullEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn model_name(&self) -> &str {
            "null"
        }
    }

    /// Replays canned output arrays and records every request.
    struct Scripted {
        replies: Mutex<VecDeque<Value>>,
        requests: Mutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(replies: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseBody, ProviderError> {
            let mut requests = self.requests.lock();
            requests.push(serde_json::to_value(request).unwrap());
            let output = self
                .replies
                .lock()
                .pop_front()
                .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))?;
            Ok(serde_json::from_value(json!({
                "id": format!("resp_{}", requests.len()),
                "output": output,
                "usage": {"input_tokens": 10, "output_tokens": 2}
            }))
            .unwrap())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn call(id: &str, name: &str, args: Value) -> Value {
        json!({"type": "function_call", "call_id": id, "name": name, "arguments": args.to_string()})
    }

    fn fixtures(provider: Arc<Scripted>) -> (CompletionClient, ToolRegistry) {
        let collection = Arc::new(InMemoryCollection::with_documents([("a.md", "alpha")]));
        let index = Arc::new(VectorIndex::new(
            collection,
            Arc::new(NullEmbedder),
            IndexSettings::default(),
        ));
        let client = CompletionClient::new(
            provider,
            CompletionSettings {
                model: "gpt-5-nano".into(),
                reasoning_effort: ReasoningEffort::Medium,
                text_verbosity: TextVerbosity::Medium,
            },
        );
        let tools = ToolRegistry::new(ToolContext {
            index,
            defaults: ToolDefaults::default(),
        });
        (client, tools)
    }

    #[tokio::test]
    async fn test_terminate_ends_without_extra_round_trip() {
        let provider = Scripted::new(vec![json!([
            call("c1", "list_files", json!({"mode": "count"})),
            call("c2", "output_to_user", json!({"message": "You have 1 note."})),
        ])]);
        let (mut client, tools) = fixtures(provider.clone());
        let hooks = HookRegistry::new();

        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .run(vec![InputItem::system("policy")], "how many notes?")
            .await;

        assert_eq!(report.final_output(), Some("You have 1 note."));
        assert_eq!(report.iterations, 1);
        assert_eq!(report.usage.requests, 1);
        assert_eq!(provider.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_outputs_threaded_back() {
        let provider = Scripted::new(vec![
            json!([call("c1", "list_tags", json!({}))]),
            json!([call("c2", "output_to_user", json!({"message": "none"}))]),
        ]);
        let (mut client, tools) = fixtures(provider.clone());
        let hooks = HookRegistry::new();

        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .run(Vec::new(), "tags?")
            .await;
        assert_eq!(report.iterations, 2);

        let requests = provider.requests.lock();
        assert_eq!(requests[1]["previous_response_id"], "resp_1");
        assert_eq!(requests[1]["input"][0]["call_id"], "c1");
        assert_eq!(requests[1]["input"][0]["output"], "{\"tags\":[]}");
    }

    #[tokio::test]
    async fn test_no_output_fails() {
        let provider = Scripted::new(vec![json!([{"type": "reasoning", "summary": []}])]);
        let (mut client, tools) = fixtures(provider);
        let hooks = HookRegistry::new();

        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .run(Vec::new(), "hello")
            .await;
        assert!(matches!(report.error(), Some(AgentError::NoOutput)));
        assert_eq!(report.iterations, 1);
        assert!(!report.error().unwrap().hint().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_iteration_count() {
        let provider = Scripted::new(vec![json!([call("c1", "list_tags", json!({}))])]);
        let (mut client, tools) = fixtures(provider);
        let hooks = HookRegistry::new();

        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .run(Vec::new(), "tags?")
            .await;
        assert!(matches!(report.error(), Some(AgentError::Provider(_))));
        assert_eq!(report.iterations, 2);
        assert_eq!(client.previous_response_id(), Some("resp_1"));
    }

    struct AlwaysApprove;

    #[async_trait]
    impl ApprovalProvider for AlwaysApprove {
        async fn approve(&self, _details: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_approval_routed_to_provider() {
        let provider = Scripted::new(vec![
            json!([call("c1", REQUEST_APPROVAL, json!({"operation_details": "read 40 files"}))]),
            json!([call("c2", "output_to_user", json!({"message": "ok"}))]),
        ]);
        let (mut client, tools) = fixtures(provider.clone());
        let mut hooks = HookRegistry::new();
        let asked = Arc::new(Mutex::new(Vec::new()));
        let a = asked.clone();
        hooks.on(
            crate::hooks::APPROVAL_REQUESTED,
            Arc::new(move |event| {
                if let HookEvent::ApprovalRequested { details } = event {
                    a.lock().push(details.clone());
                }
            }),
        );

        let approver = AlwaysApprove;
        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .with_approval(Some(&approver as &dyn ApprovalProvider))
            .run(Vec::new(), "read everything")
            .await;

        assert!(report.is_success());
        assert_eq!(*asked.lock(), vec!["read 40 files".to_string()]);
        let requests = provider.requests.lock();
        let advertised: Vec<&str> = requests[0]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert!(advertised.contains(&REQUEST_APPROVAL));
        assert_eq!(
            requests[1]["input"][0]["output"],
            "{\"approved\":true,\"message\":\"User approved\"}"
        );
    }

    #[tokio::test]
    async fn test_approval_without_provider_is_unknown_tool() {
        let provider = Scripted::new(vec![
            json!([call("c1", REQUEST_APPROVAL, json!({"operation_details": "x"}))]),
            json!([call("c2", "output_to_user", json!({"message": "ok"}))]),
        ]);
        let (mut client, tools) = fixtures(provider.clone());
        let hooks = HookRegistry::new();

        let report = AgentLoop::new(&mut client, &tools, &hooks)
            .run(Vec::new(), "x")
            .await;
        assert!(report.is_success());

        let requests = provider.requests.lock();
        assert_eq!(requests[0]["tools"].as_array().unwrap().len(), ToolKind::ALL.len());
        let output: Value =
            serde_json::from_str(requests[1]["input"][0]["output"].as_str().unwrap()).unwrap();
        assert_eq!(output["tool"], REQUEST_APPROVAL);
    }
}
