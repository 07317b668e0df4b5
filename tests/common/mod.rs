//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use vault_agent::collection::InMemoryCollection;
use vault_agent::config::{ReasoningEffort, TextVerbosity};
use vault_agent::memory::{EmbeddingProvider, IndexSettings, VectorIndex};
use vault_agent::providers::{
    CompletionProvider, CompletionSettings, ProviderError, ResponseBody, ResponseRequest,
};

// ============================================================================
// Embeddings
// ============================================================================

const CONCEPTS: [&[&str]; 4] = [
    &["citrus", "orange", "lemon", "lime"],
    &["drink", "juice", "beverage", "smoothie"],
    &["dessert", "apple", "pie", "cake", "sweet"],
    &["recipe", "bake", "cook", "oven"],
];

/// Deterministic embedder: one dimension per concept, plus a small constant
/// so that no vector has zero norm.
#[derive(Default)]
pub struct ConceptEmbedder {
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl ConceptEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut v: Vec<f32> = CONCEPTS
            .iter()
            .map(|words| {
                if words.iter().any(|w| text.contains(w)) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for ConceptEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "concept-test"
    }
}

pub fn fruit_collection() -> Arc<InMemoryCollection> {
    Arc::new(InMemoryCollection::with_documents([
        ("A.md", "Apple pie recipe: bake the apples with cinnamon in a hot oven."),
        ("B.md", "Fresh orange juice is my favourite morning beverage."),
        ("C.md", "Notes on the history of the printing press."),
    ]))
}

pub fn index_over(
    collection: Arc<InMemoryCollection>,
    embedder: Arc<ConceptEmbedder>,
    settings: IndexSettings,
) -> Arc<VectorIndex> {
    Arc::new(VectorIndex::new(collection, embedder, settings))
}

// ============================================================================
// Completions
// ============================================================================

pub type Step = Box<dyn Fn(&ResponseRequest) -> Value + Send + Sync>;

/// Completion provider driven by a script of output arrays.
///
/// Each request consumes the next step; once the script runs out the
/// `fallback` output (if any) is returned forever.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Value>,
    pub requests: Mutex<Vec<Value>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replies(outputs: Vec<Value>) -> Arc<Self> {
        Self::new(
            outputs
                .into_iter()
                .map(|o| Box::new(move |_: &ResponseRequest| o.clone()) as Step)
                .collect(),
        )
    }

    /// Answer every request with the same output.
    pub fn repeating(output: Value) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(output),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseBody, ProviderError> {
        let n = {
            let mut requests = self.requests.lock();
            requests.push(serde_json::to_value(request).expect("request serializes"));
            requests.len()
        };

        let step = self.steps.lock().pop_front();
        let output = match (step, &self.fallback) {
            (Some(step), _) => step(request),
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => {
                return Err(ProviderError::InvalidResponse("script exhausted".into()));
            }
        };

        Ok(serde_json::from_value(json!({
            "id": format!("resp_{n}"),
            "output": output,
            "usage": {
                "input_tokens": 100,
                "output_tokens": 10,
                "input_tokens_details": {"cached_tokens": 40}
            }
        }))
        .expect("scripted body deserializes"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn settings() -> CompletionSettings {
    CompletionSettings {
        model: "gpt-5-nano".into(),
        reasoning_effort: ReasoningEffort::Medium,
        text_verbosity: TextVerbosity::Medium,
    }
}

/// A `function_call` output item.
pub fn call(id: &str, name: &str, args: Value) -> Value {
    json!({
        "type": "function_call",
        "call_id": id,
        "name": name,
        "arguments": args.to_string(),
    })
}

pub fn text(message: &str) -> Value {
    json!({
        "type": "message",
        "content": [{"type": "output_text", "text": message}]
    })
}

/// Decoded `function_call_output` items of a recorded request.
pub fn tool_outputs(request: &ResponseRequest) -> Vec<Value> {
    let value = serde_json::to_value(request).expect("request serializes");
    value["input"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|item| item["type"] == "function_call_output")
        .filter_map(|item| item["output"].as_str())
        .filter_map(|raw| serde_json::from_str(raw).ok())
        .collect()
}
