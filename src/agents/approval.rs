use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Name of the approval tool advertised when a provider is attached.
pub const REQUEST_APPROVAL: &str = "request_approval";

/// Decides whether a risky operation proposed by the model may proceed.
#[async_trait]
pub trait ApprovalProvider: Send + Sync {
    async fn approve(&self, details: &str) -> bool;
}

/// Refuses every request.
pub struct DenyAll;

#[async_trait]
impl ApprovalProvider for DenyAll {
    async fn approve(&self, _details: &str) -> bool {
        false
    }
}

/// Asks on the terminal and waits for `y` or `n`.
pub struct ConsoleApproval;

#[async_trait]
impl ApprovalProvider for ConsoleApproval {
    async fn approve(&self, details: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("\nApproval required: {details}\nApprove? [y/N] ");
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

pub fn approval_schema() -> Value {
    json!({
        "type": "function",
        "name": REQUEST_APPROVAL,
        "description": "Ask the user to approve an operation before carrying it out.",
        "parameters": {
            "type": "object",
            "properties": {
                "operation_details": {
                    "type": "string",
                    "description": "What will happen and why"
                }
            },
            "required": ["operation_details"]
        }
    })
}

pub fn approval_result(approved: bool) -> Value {
    json!({
        "approved": approved,
        "message": if approved { "User approved" } else { "User denied" },
    })
}
