use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{normalize_folder, normalize_tag, parse_args};
use super::ToolContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ListMode {
    #[default]
    Page,
    Count,
}

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    mode: ListMode,
    #[serde(default)]
    cursor: usize,
    #[serde(default)]
    limit: Option<usize>,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "folder": { "type": "string", "description": "Filter by folder path" },
            "tag": { "type": "string", "description": "Filter by tag" },
            "query": { "type": "string", "description": "Simple filename pattern match" },
            "mode": {
                "type": "string",
                "enum": ["page", "count"],
                "description": "Return paginated results or just count. Default: page"
            },
            "cursor": { "type": "number", "description": "Pagination offset. Default: 0" },
            "limit": { "type": "number", "description": "Page size. Default: 200" }
        }
    })
}

/// `list_files`: enumerate documents with optional folder, name, and tag filters.
pub(super) async fn execute(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: ListFilesArgs = parse_args("list_files", args)?;
    let limit = args.limit.unwrap_or(ctx.defaults.list_limit);
    if limit == 0 {
        bail!("limit must be greater than 0");
    }

    let mut documents = ctx
        .index
        .collection()
        .list_documents()
        .await
        .context("failed to list documents")?;

    if let Some(folder) = args.folder.as_deref().map(normalize_folder) {
        documents.retain(|d| d.path.to_lowercase().starts_with(&folder));
    }

    if let Some(query) = args.query.as_deref().map(str::to_lowercase) {
        documents.retain(|d| {
            d.path.to_lowercase().contains(&query) || d.name().to_lowercase().contains(&query)
        });
    }

    if let Some(tag) = args.tag.as_deref().map(normalize_tag) {
        let mut tagged = Vec::with_capacity(documents.len());
        for doc in documents {
            let Some(meta) = ctx.index.cached_metadata(&doc.path).await else {
                continue;
            };
            if meta.all_tags().any(|t| normalize_tag(t) == tag) {
                tagged.push(doc);
            }
        }
        documents = tagged;
    }

    let total = documents.len();
    if args.mode == ListMode::Count {
        return Ok(json!({ "count": total }));
    }

    let items: Vec<&str> = documents
        .iter()
        .skip(args.cursor)
        .take(limit)
        .map(|d| d.path.as_str())
        .collect();
    let next_cursor = if args.cursor + items.len() < total {
        Some(args.cursor + limit)
    } else {
        None
    };

    Ok(json!({
        "items": items,
        "next_cursor": next_cursor,
        "total": total,
    }))
}
