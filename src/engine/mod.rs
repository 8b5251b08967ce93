// Souschef Engine — native Rust turn orchestrator
// One user message in → guardrails → bounded tool loop → guarded reply out,
// with compaction detached behind the turn.

pub mod agent_loop;
pub mod chat;
pub mod compaction;
pub mod guardrail;
pub mod http;
pub mod injection;
pub mod memory;
pub mod paths;
pub mod providers;
pub mod sanitizer;
pub mod sessions;
pub mod state;
pub mod tools;
