// Souschef Engine — conversational cooking assistant turn orchestrator
// Takes one user message and produces a safe, on-topic, tool-augmented reply
// while maintaining a durable, sanitized memory of the user's dietary profile.

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::types::{MemoryCategory, MemoryFact, TurnOutcome};
pub use engine::chat::{handle_user_turn, run_compaction};
pub use engine::providers::AnyProvider;
pub use engine::state::EngineState;
