// Souschef Engine — Tool Registry & Dispatcher
// Each tool group is a self-contained module with definitions + executor.
// Execution failures are never fatal to the turn: every error is converted
// into a structured {"error": …} tool result and fed back to the model.

use crate::atoms::types::{truncate_utf8, ToolCall, ToolDefinition, ToolResult};
use crate::engine::sessions::SessionStore;
use log::{info, warn};

pub mod memory;

impl ToolDefinition {
    /// The fixed, enumerated tool set offered on every chat turn.
    pub fn chat_tools() -> Vec<Self> {
        memory::definitions()
    }
}

// ── Main executor ──────────────────────────────────────────────────────────

/// Execute a single tool call and return the result, matched by call id.
pub fn execute_tool(
    tool_call: &ToolCall,
    store: &SessionStore,
    user_id: &str,
    conversation_id: &str,
) -> ToolResult {
    let name = &tool_call.function.name;
    let args_str = &tool_call.function.arguments;

    info!(
        "[engine] Executing tool: {} user={} args={}",
        name,
        user_id,
        truncate_utf8(args_str, 200)
    );

    let args: serde_json::Value = match serde_json::from_str(args_str) {
        Ok(v) => v,
        Err(parse_err) => {
            warn!(
                "[engine] Malformed tool args for '{}' — JSON parse failed: {}",
                name, parse_err
            );
            return error_result(
                &tool_call.id,
                format!("malformed tool arguments: {}", parse_err),
            );
        }
    };

    let outcome = memory::execute(name, &args, store, user_id, conversation_id);

    match outcome {
        Some(Ok(output)) => ToolResult {
            tool_call_id: tool_call.id.clone(),
            output,
            success: true,
        },
        Some(Err(message)) => {
            warn!("[engine] Tool '{}' failed: {}", name, message);
            error_result(&tool_call.id, message)
        }
        None => {
            warn!("[engine] Unknown tool requested: {}", name);
            error_result(&tool_call.id, format!("unknown tool: {}", name))
        }
    }
}

/// Structured error payload the model can read and explain.
fn error_result(tool_call_id: &str, message: String) -> ToolResult {
    ToolResult {
        tool_call_id: tool_call_id.to_string(),
        output: serde_json::json!({ "error": message }).to_string(),
        success: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::FunctionCall;

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: "call_t".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: args.into(),
            },
        }
    }

    #[test]
    fn test_malformed_args_become_error_result() {
        let store = SessionStore::open_in_memory().unwrap();
        let result = execute_tool(&call("add_user_memory", "{not json"), &store, "u1", "c1");
        assert!(!result.success);
        assert!(result.output.contains("\"error\""));
        assert_eq!(result.tool_call_id, "call_t");
    }

    #[test]
    fn test_unknown_tool_becomes_error_result() {
        let store = SessionStore::open_in_memory().unwrap();
        let result = execute_tool(&call("order_groceries", "{}"), &store, "u1", "c1");
        assert!(!result.success);
        assert!(result.output.contains("unknown tool"));
    }
}
