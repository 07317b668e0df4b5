use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::RetrievalRequest;

use super::common::{estimate_tokens_1k, normalize_paths, parse_args};
use super::ToolContext;

#[derive(Debug, Deserialize)]
struct RetrieveArgs {
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    within_paths: Option<Value>,
    #[serde(default)]
    max_chunks_per_file: Option<usize>,
    #[serde(default)]
    min_score: Option<f64>,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Query for semantic content retrieval" },
            "k": { "type": "number", "description": "Number of chunks to retrieve. Default: 8" },
            "within_paths": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Optional: restrict to these file paths"
            },
            "max_chunks_per_file": { "type": "number", "description": "Maximum chunks per file. Default: 2" },
            "min_score": { "type": "number", "description": "Minimum similarity score. Default: 0.3" }
        },
        "required": ["query"]
    })
}

/// `retrieve_relevant_chunks`: semantic search, annotated with a token estimate.
pub(super) async fn execute(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: RetrieveArgs = parse_args("retrieve_relevant_chunks", args)?;
    if args.query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let defaults = &ctx.defaults.retrieval;
    let request = RetrievalRequest {
        query: args.query,
        k: args.k.unwrap_or(defaults.k),
        within_paths: normalize_paths(args.within_paths.as_ref()),
        max_chunks_per_file: args.max_chunks_per_file.unwrap_or(defaults.max_chunks_per_file),
        min_score: args.min_score.unwrap_or(defaults.min_score),
    };

    let response = ctx.index.retrieve(&request).await?;
    let mut result = serde_json::to_value(&response)?;
    if response.error.is_none() {
        let chars: usize = response.hits.iter().map(|h| h.text.chars().count()).sum();
        result["estimated_tokens_1k"] = json!(estimate_tokens_1k(chars));
    }
    Ok(result)
}
