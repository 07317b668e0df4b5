use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::common::{estimate_tokens_1k, parse_args};
use super::ToolContext;

#[derive(Debug, Deserialize)]
struct PathsArgs {
    paths: Vec<String>,
}

pub(super) fn paths_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "paths": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Array of file paths"
            }
        },
        "required": ["paths"]
    })
}

/// `get_files_metadata`: sizes and timestamps, plus a budget estimate.
pub(super) async fn files_metadata(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: PathsArgs = parse_args("get_files_metadata", args)?;
    let collection = ctx.index.collection();

    let mut items = Vec::with_capacity(args.paths.len());
    let mut total_size: u64 = 0;
    for path in &args.paths {
        match collection.stat(path).await {
            Ok(Some(stat)) => {
                total_size += stat.size;
                items.push(stat);
            }
            Ok(None) => {}
            Err(e) => debug!(path = %path, error = %e, "stat failed; skipping"),
        }
    }

    Ok(json!({
        "items": items,
        "total_size_bytes": total_size,
        "total_size_kb": (total_size as f64 / 1024.0).round() as u64,
        "estimated_tokens_1k": estimate_tokens_1k(total_size as usize),
    }))
}

/// `get_frontmatter`: front-matter only, `null` for documents without any.
pub(super) async fn frontmatter(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: PathsArgs = parse_args("get_frontmatter", args)?;

    let mut items = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        if !ctx.index.collection().exists(path).await {
            continue;
        }
        let frontmatter = ctx
            .index
            .cached_metadata(path)
            .await
            .and_then(|m| m.frontmatter)
            .unwrap_or(Value::Null);
        items.push(json!({ "path": path, "frontmatter": frontmatter }));
    }

    Ok(json!({ "items": items }))
}
