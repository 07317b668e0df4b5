use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Rough token estimate for `chars` characters, rounded up to the next 1k band.
pub fn estimate_tokens_1k(chars: usize) -> usize {
    chars.div_ceil(4).div_ceil(1000) * 1000
}

/// Clean up a `within_paths` argument as models tend to send it.
///
/// A single nested array is unwrapped once, non-string entries are dropped,
/// and duplicates are removed keeping the first occurrence.
pub fn normalize_paths(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    let items = match items.as_slice() {
        [Value::Array(inner)] => inner,
        _ => items,
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_str)
        .filter(|p| seen.insert(*p))
        .map(String::from)
        .collect()
}

/// Tag in comparable form: trimmed, leading `#` removed, lowercased.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

/// Folder prefix in comparable form: lowercased, surrounding slashes removed.
pub fn normalize_folder(folder: &str) -> String {
    folder.trim().trim_matches('/').to_lowercase()
}

/// Deserialize tool arguments into their typed form.
///
/// A missing or `null` argument object is treated as `{}`.
pub fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: &Value) -> anyhow::Result<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(args).map_err(|e| anyhow::anyhow!("invalid arguments for {tool}: {e}"))
}
