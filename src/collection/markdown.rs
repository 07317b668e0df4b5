//! Markdown metadata extraction: front-matter, inline tags, and links.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Backlink, DocumentMeta};

static INLINE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s(,])#([\w/\-]+)").expect("valid tag regex"));

static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\]\|#]+)(?:#[^\]\|]*)?(?:\|[^\]]*)?\]\]").expect("valid wiki link regex")
});

static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\]\(<?([^)\s>]+\.md)>?(?:#[^)]*)?\)").expect("valid markdown link regex")
});

/// Split leading YAML front-matter off `content`.
///
/// Returns the parsed front-matter (if present and well-formed) and the byte
/// offset where the body starts. Malformed YAML yields `None` but the block is
/// still skipped.
pub fn split_frontmatter(content: &str) -> (Option<Value>, usize) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, 0);
    };
    let header_len = content.len() - rest.len();

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        if bare == "---" || bare == "..." {
            let yaml = &rest[..offset];
            let body_start = header_len + offset + line.len();
            let parsed = match serde_yaml::from_str::<Value>(yaml) {
                Ok(Value::Null) => None,
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed front-matter");
                    None
                }
            };
            return (parsed, body_start);
        }
        offset += line.len();
    }

    (None, 0)
}

/// Inline `#tags` in `body`, one entry per occurrence, fenced code skipped.
pub fn inline_tags(body: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for cap in INLINE_TAG_RE.captures_iter(line) {
            let tag = cap[1].trim_end_matches(['/', '-']);
            // `#123` is an issue reference, not a tag.
            if !tag.is_empty() && tag.chars().any(|c| !c.is_ascii_digit()) {
                tags.push(tag.to_string());
            }
        }
    }

    tags
}

/// Tags declared in the front-matter `tags` (or `tag`) field.
pub fn frontmatter_tags(frontmatter: &Value) -> Vec<String> {
    let field = frontmatter.get("tags").or_else(|| frontmatter.get("tag"));
    let raw: Vec<String> = match field {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Front-matter plus inline and front-matter tags of a Markdown document.
pub fn parse_metadata(content: &str) -> DocumentMeta {
    let (frontmatter, body_start) = split_frontmatter(content);
    let frontmatter_tags = frontmatter
        .as_ref()
        .map(frontmatter_tags)
        .unwrap_or_default();

    DocumentMeta {
        inline_tags: inline_tags(&content[body_start..]),
        frontmatter,
        frontmatter_tags,
    }
}

/// Raw link targets in `content`: `[[wiki]]` links and `[text](file.md)` links.
pub fn link_targets(content: &str) -> Vec<String> {
    let wiki = WIKI_LINK_RE
        .captures_iter(content)
        .map(|c| c[1].trim().to_string());
    let md = MD_LINK_RE
        .captures_iter(content)
        .map(|c| c[1].replace("%20", " "));
    wiki.chain(md).collect()
}

/// Whether a link target written in some document resolves to `path`.
///
/// Targets without an extension get `.md` appended; a bare file name matches
/// any document with that name, like wiki-style resolution does.
pub fn link_points_to(target: &str, path: &str) -> bool {
    let target = target
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_lowercase();
    if target.is_empty() {
        return false;
    }
    let target = if target.ends_with(".md") {
        target
    } else {
        format!("{target}.md")
    };
    let path = path.to_lowercase();

    path == target || path.ends_with(&format!("/{target}"))
}

/// Count links to `target_path` in each of `documents`, skipping self-links.
pub fn backlinks_to<'a, I>(target_path: &str, documents: I) -> Vec<Backlink>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for (from_path, content) in documents {
        if from_path == target_path {
            continue;
        }
        let count = link_targets(content)
            .iter()
            .filter(|t| link_points_to(t, target_path))
            .count();
        if count > 0 {
            *counts.entry(from_path.to_string()).or_default() += count;
        }
    }

    let mut backlinks: Vec<Backlink> = counts
        .into_iter()
        .map(|(from_path, count)| Backlink { from_path, count })
        .collect();
    backlinks.sort_by(|a, b| b.count.cmp(&a.count));
    backlinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_split_frontmatter() {
        let doc = "---\ntitle: Orange\ntags: [fruit, \"#citrus\"]\n---\nBody #drink here";
        let (fm, body_start) = split_frontmatter(doc);
        assert_eq!(fm, Some(json!({"title": "Orange", "tags": ["fruit", "#citrus"]})));
        assert_eq!(&doc[body_start..], "Body #drink here");
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, body_start) = split_frontmatter("# Heading\ntext");
        assert_eq!(fm, None);
        assert_eq!(body_start, 0);
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let (fm, body_start) = split_frontmatter("---\ntitle: x\nno end");
        assert_eq!(fm, None);
        assert_eq!(body_start, 0);
    }

    #[test]
    fn test_inline_tags() {
        let body = "# Heading\nSome #alpha and #beta/nested, not a#tag.\n```\n#code\n```\nIssue #42 (#gamma)";
        assert_eq!(inline_tags(body), vec!["alpha", "beta/nested", "gamma"]);
    }

    #[test]
    fn test_parse_metadata_merges_sources() {
        let meta = parse_metadata("---\ntags: a, b\n---\ntext #c");
        assert_eq!(meta.frontmatter_tags, vec!["a", "b"]);
        assert_eq!(meta.inline_tags, vec!["c"]);
        assert_eq!(meta.all_tags().count(), 3);
    }

    #[test]
    fn test_link_targets_and_resolution() {
        let content = "See [[Recipes/Orange Juice|OJ]] and [[apple#Intro]] and [x](notes/B.md).";
        let targets = link_targets(content);
        assert_eq!(targets, vec!["Recipes/Orange Juice", "apple", "notes/B.md"]);

        assert!(link_points_to("apple", "fruit/apple.md"));
        assert!(link_points_to("Recipes/Orange Juice", "recipes/orange juice.md"));
        assert!(link_points_to("notes/B.md", "notes/B.md"));
        assert!(!link_points_to("pineapple", "apple.md"));
    }

    #[test]
    fn test_backlinks_counts_per_source() {
        let docs = vec![
            ("a.md", "[[target]] and again [[target]]"),
            ("b.md", "[t](target.md)"),
            ("target.md", "[[target]]"),
            ("c.md", "nothing"),
        ];
        let links = backlinks_to("target.md", docs);
        assert_eq!(
            links,
            vec![
                Backlink { from_path: "a.md".into(), count: 2 },
                Backlink { from_path: "b.md".into(), count: 1 },
            ]
        );
    }
}
