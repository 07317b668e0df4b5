use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

pub const TOOL_CALL_STARTED: &str = "tool_call_started";
pub const TOOL_CALL_FINISHED: &str = "tool_call_finished";
pub const ASSISTANT_UPDATE: &str = "assistant_update";
pub const APPROVAL_REQUESTED: &str = "approval_requested";
pub const TURN_FINISHED: &str = "turn_finished";

/// Events fired while the agent works through a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    ToolCallStarted {
        call_id: String,
        name: String,
        arguments: Value,
    },
    ToolCallFinished {
        call_id: String,
        name: String,
        result: Value,
    },
    /// Text the model produced alongside tool calls.
    AssistantUpdate { text: String },
    ApprovalRequested { details: String },
    TurnFinished { iterations: u32, success: bool },
}

impl HookEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            HookEvent::ToolCallStarted { .. } => TOOL_CALL_STARTED,
            HookEvent::ToolCallFinished { .. } => TOOL_CALL_FINISHED,
            HookEvent::AssistantUpdate { .. } => ASSISTANT_UPDATE,
            HookEvent::ApprovalRequested { .. } => APPROVAL_REQUESTED,
            HookEvent::TurnFinished { .. } => TURN_FINISHED,
        }
    }
}

/// A hook handler. Handlers run inline, in registration order, so they
/// should return quickly.
pub type HookHandler = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// Registry for agent lifecycle hooks.
#[derive(Default, Clone)]
pub struct HookRegistry {
    handlers: HashMap<String, Vec<HookHandler>>,
    catch_all: Vec<HookHandler>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type.
    pub fn on(&mut self, event_type: &str, handler: HookHandler) {
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Register a handler for every event.
    pub fn on_any(&mut self, handler: HookHandler) {
        self.catch_all.push(handler);
    }

    /// Fire an event to all matching handlers.
    pub fn emit(&self, event: HookEvent) {
        if let Some(handlers) = self.handlers.get(event.event_type()) {
            for handler in handlers {
                handler(&event);
            }
        }
        for handler in &self.catch_all {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hook_registry_new_is_empty() {
        let registry = HookRegistry::new();
        registry.emit(HookEvent::AssistantUpdate { text: "hi".into() });
    }

    #[test]
    fn test_handlers_receive_matching_events_only() {
        let mut registry = HookRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        registry.on(
            TOOL_CALL_STARTED,
            Arc::new(move |_event| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit(HookEvent::ToolCallStarted {
            call_id: "c1".into(),
            name: "list_tags".into(),
            arguments: Value::Null,
        });
        registry.emit(HookEvent::AssistantUpdate { text: "x".into() });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_catch_all_sees_events_in_order() {
        let mut registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        registry.on_any(Arc::new(move |event| s.lock().push(event.event_type())));

        registry.emit(HookEvent::AssistantUpdate { text: "a".into() });
        registry.emit(HookEvent::TurnFinished {
            iterations: 1,
            success: true,
        });

        assert_eq!(*seen.lock(), vec![ASSISTANT_UPDATE, TURN_FINISHED]);
    }
}
