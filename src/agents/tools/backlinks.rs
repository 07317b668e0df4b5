use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::parse_args;
use super::ToolContext;

#[derive(Debug, Deserialize)]
struct BacklinksArgs {
    path: String,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": "Target file path" }
        },
        "required": ["path"]
    })
}

pub(super) async fn execute(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: BacklinksArgs = parse_args("list_backlinks", args)?;
    let backlinks = ctx
        .index
        .collection()
        .backlinks(&args.path)
        .await
        .with_context(|| format!("failed to collect backlinks for {}", args.path))?;

    Ok(match backlinks {
        Some(backlinks) => json!({ "backlinks": backlinks }),
        None => json!({ "error": "File not found", "backlinks": [] }),
    })
}
