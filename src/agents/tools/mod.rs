mod backlinks;
mod batch_read;
mod common;
mod enumerate;
mod metadata;
mod retrieve;
mod tags;
mod terminate;

pub use common::*;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{Config, RetrievalConfig, DEFAULT_LIST_LIMIT, DEFAULT_MAX_TOTAL_CHARS};
use crate::memory::VectorIndex;

// ============================================================================
// Tool System
// ============================================================================

/// Every tool the agent can call. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    EnumerateDocuments,
    GetMetadata,
    GetFrontmatter,
    ListTags,
    ListBacklinks,
    BatchRead,
    SemanticRetrieve,
    Terminate,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::EnumerateDocuments,
        ToolKind::GetMetadata,
        ToolKind::GetFrontmatter,
        ToolKind::ListTags,
        ToolKind::ListBacklinks,
        ToolKind::BatchRead,
        ToolKind::SemanticRetrieve,
        ToolKind::Terminate,
    ];

    /// Name the model calls the tool by.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::EnumerateDocuments => "list_files",
            ToolKind::GetMetadata => "get_files_metadata",
            ToolKind::GetFrontmatter => "get_frontmatter",
            ToolKind::ListTags => "list_tags",
            ToolKind::ListBacklinks => "list_backlinks",
            ToolKind::BatchRead => "read_files_batch",
            ToolKind::SemanticRetrieve => "retrieve_relevant_chunks",
            ToolKind::Terminate => "output_to_user",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::EnumerateDocuments => {
                "Enumerate files with optional filters. Use for counts, lists, discovery. Supports pagination."
            }
            ToolKind::GetMetadata => "Get metadata (size, dates) for multiple files.",
            ToolKind::GetFrontmatter => "Read frontmatter only (cheap, no content).",
            ToolKind::ListTags => "Get all tags in vault or filter by prefix.",
            ToolKind::ListBacklinks => "Get incoming links to a file.",
            ToolKind::BatchRead => "Read multiple files with budget protection.",
            ToolKind::SemanticRetrieve => {
                "SEMANTIC passage retrieval using embeddings. Finds conceptually similar content, \
                 not just keyword matches. Use AFTER narrowing with list_files."
            }
            ToolKind::Terminate => {
                "Present final answer. This TERMINATES the loop. Only call when task is complete."
            }
        }
    }

    pub fn input_schema(&self) -> Value {
        match self {
            ToolKind::EnumerateDocuments => enumerate::input_schema(),
            ToolKind::GetMetadata | ToolKind::GetFrontmatter => metadata::paths_schema(),
            ToolKind::ListTags => tags::input_schema(),
            ToolKind::ListBacklinks => backlinks::input_schema(),
            ToolKind::BatchRead => batch_read::input_schema(),
            ToolKind::SemanticRetrieve => retrieve::input_schema(),
            ToolKind::Terminate => terminate::input_schema(),
        }
    }

    /// A successful call ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolKind::Terminate)
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Whether an empty result from this tool counts towards escalation.
    fn is_zero_result(&self, result: &Value) -> bool {
        match self {
            ToolKind::EnumerateDocuments => {
                result.get("count").and_then(Value::as_u64) == Some(0)
                    || result
                        .get("items")
                        .and_then(Value::as_array)
                        .is_some_and(|items| items.is_empty())
            }
            ToolKind::SemanticRetrieve => result
                .get("hits")
                .and_then(Value::as_array)
                .map_or(true, |hits| hits.is_empty()),
            _ => false,
        }
    }
}

/// Information about an available tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolInfo {
    /// Function schema in the shape the Responses API expects.
    pub fn function_schema(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.input_schema,
        })
    }
}

/// Limits tools fall back to when the model leaves an argument out.
#[derive(Debug, Clone)]
pub struct ToolDefaults {
    pub list_limit: usize,
    pub max_total_chars: usize,
    pub retrieval: RetrievalConfig,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            list_limit: DEFAULT_LIST_LIMIT,
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl From<&Config> for ToolDefaults {
    fn from(config: &Config) -> Self {
        Self {
            retrieval: config.retrieval.clone(),
            ..Self::default()
        }
    }
}

/// Context provided to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    pub index: Arc<VectorIndex>,
    pub defaults: ToolDefaults,
}

// ============================================================================
// Registry
// ============================================================================

/// Dispatches tool calls and tracks repeated empty results.
pub struct ToolRegistry {
    ctx: ToolContext,
    history: Mutex<HashMap<String, u32>>,
}

impl ToolRegistry {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        ToolKind::ALL.iter().map(ToolKind::info).collect()
    }

    /// Function schemas for every tool, ready to send with a request.
    pub fn schemas(&self) -> Vec<Value> {
        self.list().iter().map(ToolInfo::function_schema).collect()
    }

    /// Run one tool call. Never fails: errors come back as `{error, tool}`.
    ///
    /// When `list_files` or `retrieve_relevant_chunks` comes back empty for
    /// arguments that already produced nothing earlier, the output is flagged
    /// with `repeated_zero_result` and an escalation hint.
    pub async fn execute(&self, name: &str, arguments: &Value) -> Value {
        let Some(kind) = ToolKind::from_name(name) else {
            warn!(tool = name, "model called an unknown tool");
            return json!({ "error": format!("Tool not found: {name}"), "tool": name });
        };

        info!(tool = name, "executing tool");
        debug!(tool = name, arguments = %arguments, "tool arguments");

        let mut result = match self.dispatch(kind, arguments).await {
            Ok(result) => result,
            Err(e) => {
                error!(tool = name, error = %e, "tool execution failed");
                return json!({ "error": e.to_string(), "tool": name });
            }
        };

        if kind.is_zero_result(&result) {
            let key = format!("{name}:{arguments}");
            let previous = {
                let mut history = self.history.lock();
                let count = history.entry(key).or_insert(0);
                *count += 1;
                *count - 1
            };
            if previous > 0 {
                warn!(tool = name, times = previous + 1, "tool returned no results again");
                if let Some(obj) = result.as_object_mut() {
                    obj.insert("repeated_zero_result".into(), Value::Bool(true));
                    obj.insert(
                        "escalation_hint".into(),
                        Value::String("Consider broadening search scope".into()),
                    );
                }
            }
        }

        debug!(tool = name, "tool completed");
        result
    }

    async fn dispatch(&self, kind: ToolKind, args: &Value) -> anyhow::Result<Value> {
        let ctx = &self.ctx;
        match kind {
            ToolKind::EnumerateDocuments => enumerate::execute(ctx, args).await,
            ToolKind::GetMetadata => metadata::files_metadata(ctx, args).await,
            ToolKind::GetFrontmatter => metadata::frontmatter(ctx, args).await,
            ToolKind::ListTags => tags::execute(ctx, args).await,
            ToolKind::ListBacklinks => backlinks::execute(ctx, args).await,
            ToolKind::BatchRead => batch_read::execute(ctx, args).await,
            ToolKind::SemanticRetrieve => retrieve::execute(ctx, args).await,
            ToolKind::Terminate => terminate::execute(args),
        }
    }

    /// Times `name` returned nothing for exactly these arguments.
    pub fn history_count(&self, name: &str, arguments: &Value) -> u32 {
        self.history
            .lock()
            .get(&format!("{name}:{arguments}"))
            .copied()
            .unwrap_or(0)
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::InMemoryCollection;
    use crate::memory::{EmbeddingProvider, IndexSettings};
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Two-dimensional embedding: does the text mention "tea" or not.
    struct TeaEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TeaEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("tea") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "tea"
        }
    }

    fn registry() -> (ToolRegistry, Arc<InMemoryCollection>) {
        let collection = Arc::new(InMemoryCollection::with_documents([
            (
                "Journal/2024-01-01.md",
                "---\ntags: [daily, Mood]\n---\nGreen tea in the morning. #health",
            ),
            ("Journal/2024-01-02.md", "Rainy walk. #Health #mood"),
            ("Projects/roadmap.md", "See [[2024-01-01]] and [[2024-01-01]]. #work"),
            ("inbox.md", "Links to [roadmap](Projects/roadmap.md)."),
        ]));
        let index = Arc::new(VectorIndex::new(
            collection.clone(),
            Arc::new(TeaEmbedder),
            IndexSettings::default(),
        ));
        let registry = ToolRegistry::new(ToolContext {
            index,
            defaults: ToolDefaults::default(),
        });
        (registry, collection)
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("search_lexical"), None);
        assert!(ToolKind::Terminate.is_terminal());
        assert!(!ToolKind::ListTags.is_terminal());
    }

    #[test]
    fn test_schemas_cover_every_tool() {
        let (registry, _) = registry();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), ToolKind::ALL.len());
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["name"], "list_files");
        assert_eq!(schemas[7]["parameters"]["required"], json!(["message"]));
    }

    #[tokio::test]
    async fn test_list_files_paginates() {
        let (registry, _) = registry();

        let page = registry
            .execute("list_files", &json!({"folder": "/journal/", "limit": 1}))
            .await;
        assert_eq!(page["items"], json!(["Journal/2024-01-01.md"]));
        assert_eq!(page["next_cursor"], 1);
        assert_eq!(page["total"], 2);

        let last = registry
            .execute("list_files", &json!({"folder": "Journal", "limit": 1, "cursor": 1}))
            .await;
        assert_eq!(last["items"], json!(["Journal/2024-01-02.md"]));
        assert_eq!(last["next_cursor"], Value::Null);
    }

    #[tokio::test]
    async fn test_list_files_count_and_filters() {
        let (registry, _) = registry();

        let by_tag = registry
            .execute("list_files", &json!({"tag": "#MOOD", "mode": "count"}))
            .await;
        assert_eq!(by_tag, json!({"count": 2}));

        let by_query = registry.execute("list_files", &json!({"query": "ROAD"})).await;
        assert_eq!(by_query["items"], json!(["Projects/roadmap.md"]));
    }

    #[tokio::test]
    async fn test_list_files_rejects_zero_limit() {
        let (registry, _) = registry();
        let result = registry.execute("list_files", &json!({"limit": 0})).await;
        assert_eq!(result["tool"], "list_files");
        assert!(result["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_metadata_omits_missing_files() {
        let (registry, _) = registry();
        let result = registry
            .execute(
                "get_files_metadata",
                &json!({"paths": ["inbox.md", "nope.md"]}),
            )
            .await;
        let items = result["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["path"], "inbox.md");
        let size = items[0]["size"].as_u64().unwrap();
        assert_eq!(result["total_size_bytes"], size);
        assert_eq!(result["total_size_kb"], 0);
        assert_eq!(result["estimated_tokens_1k"], 1000);
    }

    #[tokio::test]
    async fn test_frontmatter_null_when_absent() {
        let (registry, _) = registry();
        let result = registry
            .execute(
                "get_frontmatter",
                &json!({"paths": ["Journal/2024-01-01.md", "inbox.md", "gone.md"]}),
            )
            .await;
        assert_eq!(
            result["items"],
            json!([
                {"path": "Journal/2024-01-01.md", "frontmatter": {"tags": ["daily", "Mood"]}},
                {"path": "inbox.md", "frontmatter": null}
            ])
        );
    }

    #[tokio::test]
    async fn test_list_tags_merges_case() {
        let (registry, _) = registry();
        let result = registry.execute("list_tags", &json!({})).await;
        let tags = result["tags"].as_array().unwrap();
        assert_eq!(tags[0]["count"], 2);
        assert_eq!(tags[1]["count"], 2);
        let names: Vec<String> = tags
            .iter()
            .map(|t| t["tag"].as_str().unwrap().to_lowercase())
            .collect();
        assert_eq!(names, vec!["health", "mood", "daily", "work"]);

        let filtered = registry.execute("list_tags", &json!({"prefix": "#WO"})).await;
        assert_eq!(filtered["tags"], json!([{"tag": "work", "count": 1}]));
    }

    #[tokio::test]
    async fn test_backlinks() {
        let (registry, _) = registry();
        let result = registry
            .execute("list_backlinks", &json!({"path": "Journal/2024-01-01.md"}))
            .await;
        assert_eq!(
            result,
            json!({"backlinks": [{"from_path": "Projects/roadmap.md", "count": 2}]})
        );

        let missing = registry
            .execute("list_backlinks", &json!({"path": "nope.md"}))
            .await;
        assert_eq!(missing, json!({"error": "File not found", "backlinks": []}));
    }

    #[tokio::test]
    async fn test_batch_read_budget() {
        let (registry, collection) = registry();
        collection.upsert("a.md", "0123456789");
        collection.upsert("b.md", "abcdefghij");
        collection.upsert("c.md", "klmnopqrst");

        let result = registry
            .execute(
                "read_files_batch",
                &json!({"paths": ["a.md", "missing.md", "b.md", "c.md"], "max_total_chars": 15}),
            )
            .await;

        assert_eq!(
            result["items"],
            json!([
                {"path": "a.md", "text": "0123456789"},
                {"path": "b.md", "text": "abcde", "truncated": true}
            ])
        );
        assert_eq!(result["truncated_paths"], json!(["b.md", "c.md"]));
        assert_eq!(result["total_chars"], 15);
        assert_eq!(result["estimated_tokens_1k"], 1000);
    }

    #[tokio::test]
    async fn test_retrieve_before_indexing_reports_error() {
        let (registry, _) = registry();
        let result = registry
            .execute("retrieve_relevant_chunks", &json!({"query": "tea"}))
            .await;
        assert!(result["error"].is_string());
        assert_eq!(result["hits"], json!([]));
        assert!(result.get("estimated_tokens_1k").is_none());
    }

    #[tokio::test]
    async fn test_retrieve_adds_token_estimate() {
        let (registry, _) = registry();
        registry.context().index.rebuild().await.unwrap();

        let result = registry
            .execute(
                "retrieve_relevant_chunks",
                &json!({"query": "tea", "within_paths": [["Journal/2024-01-01.md", 1]]}),
            )
            .await;
        let hits = result["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["path"], "Journal/2024-01-01.md");
        assert!(hits[0].get("embedding").is_none());
        assert_eq!(result["estimated_tokens_1k"], 1000);
    }

    #[tokio::test]
    async fn test_terminate_requires_message() {
        let (registry, _) = registry();
        let ok = registry
            .execute("output_to_user", &json!({"message": "done"}))
            .await;
        assert_eq!(ok, json!({"final_output": true, "message": "done"}));

        let bad = registry.execute("output_to_user", &json!({})).await;
        assert_eq!(bad["tool"], "output_to_user");
        assert!(bad["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (registry, _) = registry();
        let result = registry.execute("delete_everything", &json!({})).await;
        assert_eq!(
            result,
            json!({"error": "Tool not found: delete_everything", "tool": "delete_everything"})
        );
    }

    #[tokio::test]
    async fn test_zero_result_escalates_on_repeat_only() {
        let (registry, _) = registry();
        let args = json!({"folder": "Archive"});

        let first = registry.execute("list_files", &args).await;
        assert!(first.get("repeated_zero_result").is_none());

        let second = registry.execute("list_files", &args).await;
        assert_eq!(second["repeated_zero_result"], true);
        assert_eq!(second["escalation_hint"], "Consider broadening search scope");
        assert_eq!(registry.history_count("list_files", &args), 2);

        let other = registry
            .execute("list_files", &json!({"folder": "Elsewhere"}))
            .await;
        assert!(other.get("repeated_zero_result").is_none());

        registry.clear_history();
        let after_clear = registry.execute("list_files", &args).await;
        assert!(after_clear.get("repeated_zero_result").is_none());
    }
}
