use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::common::{estimate_tokens_1k, parse_args};
use super::ToolContext;

#[derive(Debug, Deserialize)]
struct BatchReadArgs {
    paths: Vec<String>,
    #[serde(default)]
    max_total_chars: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ReadItem {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "paths": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Array of file paths to read"
            },
            "max_total_chars": {
                "type": "number",
                "description": "Maximum total characters. Default: 50000"
            }
        },
        "required": ["paths"]
    })
}

/// `read_files_batch`: read documents in order until the character budget is spent.
///
/// Paths left over once the budget is reached are reported in
/// `truncated_paths` without being read. A document cut short by the budget
/// is returned with `truncated: true` and listed there too.
pub(super) async fn execute(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: BatchReadArgs = parse_args("read_files_batch", args)?;
    let budget = args
        .max_total_chars
        .filter(|n| *n > 0)
        .unwrap_or(ctx.defaults.max_total_chars);
    let collection = ctx.index.collection();

    let mut items = Vec::new();
    let mut truncated_paths = Vec::new();
    let mut total_chars = 0usize;

    for path in args.paths {
        if total_chars >= budget {
            truncated_paths.push(path);
            continue;
        }
        if !collection.exists(&path).await {
            continue;
        }

        let content = match collection.read(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path, error = %e, "batch read failed");
                items.push(ReadItem {
                    path,
                    text: None,
                    truncated: false,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let remaining = budget - total_chars;
        let len = content.chars().count();
        if len <= remaining {
            total_chars += len;
            items.push(ReadItem {
                path,
                text: Some(content),
                truncated: false,
                error: None,
            });
        } else {
            total_chars += remaining;
            truncated_paths.push(path.clone());
            items.push(ReadItem {
                path,
                text: Some(content.chars().take(remaining).collect()),
                truncated: true,
                error: None,
            });
        }
    }

    Ok(json!({
        "items": items,
        "truncated_paths": truncated_paths,
        "total_chars": total_chars,
        "estimated_tokens_1k": estimate_tokens_1k(total_chars),
    }))
}
