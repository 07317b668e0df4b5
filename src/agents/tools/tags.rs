use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::common::{normalize_tag, parse_args};
use super::ToolContext;

#[derive(Debug, Deserialize)]
struct ListTagsArgs {
    #[serde(default)]
    prefix: Option<String>,
}

#[derive(Debug, Serialize)]
struct TagCount {
    tag: String,
    count: usize,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prefix": { "type": "string", "description": "Optional prefix filter" }
        }
    })
}

/// `list_tags`: every tag with its occurrence count, most used first.
///
/// Tags differing only in case are merged under the first spelling seen.
pub(super) async fn execute(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let args: ListTagsArgs = parse_args("list_tags", args)?;
    let documents = ctx
        .index
        .collection()
        .list_documents()
        .await
        .context("failed to list documents")?;

    // normalized tag -> (display spelling, count)
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for doc in &documents {
        let Some(meta) = ctx.index.cached_metadata(&doc.path).await else {
            continue;
        };
        for tag in meta.all_tags() {
            let display = tag.trim().trim_start_matches('#');
            if display.is_empty() {
                continue;
            }
            counts
                .entry(normalize_tag(display))
                .or_insert_with(|| (display.to_string(), 0))
                .1 += 1;
        }
    }

    let prefix = args.prefix.as_deref().map(normalize_tag);
    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .filter(|(key, _)| prefix.as_deref().map_or(true, |p| key.starts_with(p)))
        .map(|(_, (tag, count))| TagCount { tag, count })
        .collect();
    tags.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.tag.to_lowercase().cmp(&b.tag.to_lowercase()))
    });

    Ok(json!({ "tags": tags }))
}
