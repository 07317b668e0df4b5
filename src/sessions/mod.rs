use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::agents::tools::{ToolContext, ToolDefaults, ToolRegistry};
use crate::agents::{AgentLoop, ApprovalProvider, ContextBuilder, TurnReport};
use crate::config::{validate_credentials, Config};
use crate::hooks::HookRegistry;
use crate::memory::VectorIndex;
use crate::providers::{CompletionClient, CompletionProvider, CompletionSettings, OpenAiResponsesProvider};

// ============================================================================
// Agent Session
// ============================================================================

/// One conversation with the agent.
///
/// Sessions share the vector index but own everything else: the completion
/// thread, tool call history, hooks, and the approval provider. Two sessions
/// over the same index never see each other's thread or history.
///
/// The metadata cache belongs to the index, so it is shared as well; see
/// [`AgentSession::reset`].
pub struct AgentSession {
    index: Arc<VectorIndex>,
    client: CompletionClient,
    tools: ToolRegistry,
    context: ContextBuilder,
    hooks: HookRegistry,
    approval: Option<Arc<dyn ApprovalProvider>>,
    max_iterations: u32,
}

impl AgentSession {
    pub fn new(
        index: Arc<VectorIndex>,
        provider: Arc<dyn CompletionProvider>,
        settings: CompletionSettings,
        defaults: ToolDefaults,
    ) -> Self {
        let tools = ToolRegistry::new(ToolContext {
            index: index.clone(),
            defaults,
        });
        Self {
            index,
            client: CompletionClient::new(provider, settings),
            tools,
            context: ContextBuilder::new(),
            hooks: HookRegistry::new(),
            approval: None,
            max_iterations: crate::config::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Build a session talking to the configured OpenAI endpoint.
    pub fn from_config(config: &Config, index: Arc<VectorIndex>) -> Result<Self> {
        let api_key = validate_credentials(config).context("invalid OpenAI credentials")?;
        let provider = Arc::new(OpenAiResponsesProvider::new(
            api_key,
            Some(config.openai.base_url.clone()),
        ));

        Ok(Self::new(
            index,
            provider,
            CompletionSettings::from(&config.agent),
            ToolDefaults::from(config),
        )
        .with_context_builder(ContextBuilder::from_config(&config.agent))
        .with_max_iterations(config.agent.max_iterations))
    }

    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalProvider>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Thread id of the last completion response, if a conversation is open.
    pub fn thread_id(&self) -> Option<&str> {
        self.client.previous_response_id()
    }

    /// Answer one user message. Follow-up turns continue the same thread.
    pub async fn run_turn(&mut self, message: &str) -> TurnReport {
        let system = self.context.build(&self.index.stats());
        AgentLoop::new(&mut self.client, &self.tools, &self.hooks)
            .with_approval(self.approval.as_deref())
            .with_max_iterations(self.max_iterations)
            .run(system, message)
            .await
    }

    /// Start over: forget the thread, cached metadata, and tool history.
    ///
    /// Clearing the metadata cache affects every session on the same index.
    /// Those sessions only pay for re-reading metadata; their thread and
    /// tool history are untouched.
    pub fn reset(&mut self) {
        self.client.reset();
        self.index.clear_metadata_cache();
        self.tools.clear_history();
        info!("session reset");
    }
}
