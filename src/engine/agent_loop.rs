// Souschef Engine — Agentic Loop
// The core orchestration loop: send to model → tool calls → execute → repeat.
//
// Invariants:
//   • at most `max_rounds` completion round-trips per turn;
//   • tool calls execute sequentially in emission order (later calls may
//     depend on earlier effects, e.g. update-after-add);
//   • results are matched back to calls by id, never positionally;
//   • tool failures are data, not errors — only a failed primary completion
//     call aborts the turn.

use crate::atoms::constants::EMPTY_REPLY_FALLBACK;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{Message, Role, ToolDefinition};
use crate::engine::providers::AnyProvider;
use crate::engine::sessions::SessionStore;
use crate::engine::tools;
use log::{info, warn};

/// What a finished loop hands back to the turn workflow.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    pub tool_calls_used: u32,
}

/// Run a complete agent turn: send messages to the model, execute tool
/// calls, and repeat until the model produces a final text response or the
/// round cap is hit.
pub async fn run_agent_turn(
    provider: &AnyProvider,
    model: &str,
    messages: &mut Vec<Message>,
    tools_available: &[ToolDefinition],
    store: &SessionStore,
    user_id: &str,
    conversation_id: &str,
    max_rounds: u32,
) -> EngineResult<TurnReply> {
    let mut round = 0;
    let mut tool_calls_used: u32 = 0;
    let mut last_text = String::new();

    loop {
        round += 1;
        if round > max_rounds {
            warn!(
                "[engine] Max tool rounds ({}) reached, stopping with last content",
                max_rounds
            );
            let text = if last_text.is_empty() {
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                last_text
            };
            return Ok(TurnReply {
                text,
                tool_calls_used,
            });
        }

        info!(
            "[engine] Agent round {}/{} conversation={}",
            round, max_rounds, conversation_id
        );

        // ── 1. Call the AI model ──────────────────────────────────────
        // A failure here is a hard, retryable failure of the whole turn —
        // distinct from the model merely declining to answer.
        let completion = provider
            .complete(messages, tools_available, model, None)
            .await?;

        let text = completion.content.clone().unwrap_or_default();
        if !text.is_empty() {
            last_text = text.clone();
        }

        // ── 2. If no tool calls, we're done ──────────────────────────
        if completion.tool_calls.is_empty() {
            let final_text = if text.is_empty() {
                warn!("[engine] Model returned empty terminal response");
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                text.clone()
            };
            messages.push(Message::text(Role::Assistant, text));
            return Ok(TurnReply {
                text: final_text,
                tool_calls_used,
            });
        }

        // ── 3. Record the assistant message with its tool calls ───────
        messages.push(Message {
            role: Role::Assistant,
            content: text,
            tool_calls: Some(completion.tool_calls.clone()),
            tool_call_id: None,
            name: None,
        });

        // ── 4. Execute each tool call in emission order ───────────────
        let tc_count = completion.tool_calls.len();
        for tc in &completion.tool_calls {
            info!("[engine] Tool call: {} id={}", tc.function.name, tc.id);

            let result = tools::execute_tool(tc, store, user_id, conversation_id);
            tool_calls_used += 1;

            info!(
                "[engine] Tool result: {} success={} output_len={}",
                tc.function.name,
                result.success,
                result.output.len()
            );

            // Matched by the call's own id — a round may carry several calls.
            messages.push(Message {
                role: Role::Tool,
                content: result.output,
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id),
                name: Some(tc.function.name.clone()),
            });
        }

        // ── 5. Loop: send tool results back to the model ──────────────
        info!(
            "[engine] {} tool calls executed, feeding results back to model",
            tc_count
        );
    }
}
