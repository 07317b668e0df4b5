use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::parse_args;

#[derive(Debug, Deserialize)]
struct OutputArgs {
    message: String,
}

pub(super) fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string", "description": "Final answer to display" }
        },
        "required": ["message"]
    })
}

/// `output_to_user`: hand the final answer back; ends the turn.
pub(super) fn execute(args: &Value) -> Result<Value> {
    let args: OutputArgs = parse_args("output_to_user", args)?;
    Ok(json!({ "final_output": true, "message": args.message }))
}
