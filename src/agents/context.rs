use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::AgentConfig;
use crate::memory::IndexStats;
use crate::providers::InputItem;

const DEFAULT_TOOL_POLICY: &str = r#"# Tool Use (Read-Only Agent)

## Core Rules
- **Global facts** (contains "how many", "total", "list all"):
  1) Use `list_files` with filters (folder/tag/query).
  2) Paginate with `cursor` until `next_cursor=null` OR use `mode:"count"`.
  3) Compute the result, then call `output_to_user`.
  4) Never infer counts from passages.

- **Content/meaning questions** ("what did I write about X?", summarize, compare):
  1) First bound the set with `list_files`, `list_tags` or `get_frontmatter`.
  2) Use `retrieve_relevant_chunks` for semantic matches inside that set.
  3) Synthesize an answer, cite paths, then call `output_to_user`.

- `retrieve_relevant_chunks` finds conceptually similar content, not just keyword
  matches: "burnout" also finds "exhaustion" or "overwhelmed".

## Budget
- Estimate tokens as chars/4, rounded up to 1k bands (`estimated_tokens_1k`).
- Up to 5k proceed; 5-10k narrow or paginate; 10-20k ask the user; above 20k revise the plan.

## Termination
- The loop ends when you call `output_to_user`.
- Every function call gets a matching function output before the next turn.

## Examples
- "What did I write about productivity?"
  1) `list_files(folder="Journal/")`
  2) `retrieve_relevant_chunks(query="productivity", within_paths=items, k=8)`
  3) `output_to_user("[summary with citations]")`
- "How many journal entries?"
  1) `list_files(folder="Journal/", mode:"count")`
  2) `output_to_user("You have N entries.")`"#;

const DEFAULT_COMPLETION_CRITERIA: &str = r#"# Completion Criteria

- Understand the user's intent (confidence at least 80%)
- Have the necessary context from tools
- Plan formulated
- Risky operations approved
- Execution successful
- User request fulfilled

When all items hold, call output_to_user with the final result.

## Notes
- output_to_user terminates the loop; use it only when done
- If you need more information, use more tools
- Verify before presenting the final answer"#;

/// Builds the system messages that open every turn.
///
/// Produces three messages in a fixed order: tool policy, completion
/// criteria, then the current index status.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    tool_policy: Option<PathBuf>,
    completion_criteria: Option<PathBuf>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            tool_policy: config.tool_policy_prompt.clone(),
            completion_criteria: config.completion_prompt.clone(),
        }
    }

    pub fn build(&self, stats: &IndexStats) -> Vec<InputItem> {
        vec![
            InputItem::system(load_override(self.tool_policy.as_deref(), DEFAULT_TOOL_POLICY)),
            InputItem::system(load_override(
                self.completion_criteria.as_deref(),
                DEFAULT_COMPLETION_CRITERIA,
            )),
            InputItem::system(index_status(stats)),
        ]
    }
}

fn load_override(path: Option<&Path>, fallback: &str) -> String {
    let Some(path) = path else {
        return fallback.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            debug!(path = %path.display(), "prompt override is empty; using built-in text");
            fallback.to_string()
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "prompt override unreadable; using built-in text");
            fallback.to_string()
        }
    }
}

fn index_status(stats: &IndexStats) -> String {
    format!(
        "# What You Know\n\n\
         ## Vault Index Status\n\
         - Total Files: {}\n\
         - Total Chunks: {}\n\
         - Search Method: embeddings ({})\n\
         - Index Ready: {}\n\n\
         Use retrieve_relevant_chunks for meaning-based queries after narrowing with list_files.",
        stats.total_files,
        stats.total_chunks,
        stats.embedding_model,
        if stats.indexed { "YES" } else { "NO" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stats(indexed: bool) -> IndexStats {
        IndexStats {
            total_files: 3,
            total_chunks: 7,
            indexed,
            indexing: false,
            embedding_model: "text-embedding-3-small".into(),
        }
    }

    fn content(item: &InputItem) -> &str {
        match item {
            InputItem::Message { role, content } => {
                assert_eq!(role, "system");
                content
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_three_messages_in_order() {
        let messages = ContextBuilder::new().build(&stats(true));
        assert_eq!(messages.len(), 3);
        assert!(content(&messages[0]).starts_with("# Tool Use"));
        assert!(content(&messages[1]).starts_with("# Completion Criteria"));
        let status = content(&messages[2]);
        assert!(status.contains("Total Files: 3"));
        assert!(status.contains("Total Chunks: 7"));
        assert!(status.contains("Index Ready: YES"));
    }

    #[test]
    fn test_override_file_and_missing_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Only count things.").unwrap();

        let builder = ContextBuilder {
            tool_policy: Some(file.path().to_path_buf()),
            completion_criteria: Some(PathBuf::from("/nonexistent/criteria.md")),
        };
        let messages = builder.build(&stats(false));
        assert_eq!(content(&messages[0]), "Only count things.");
        assert!(content(&messages[1]).starts_with("# Completion Criteria"));
        assert!(content(&messages[2]).contains("Index Ready: NO"));
    }
}
