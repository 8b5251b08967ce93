// ── Souschef Atoms: Constants ──────────────────────────────────────────────
// All named constants for the crate live here.
// Collecting them in one place eliminates magic strings and makes the
// guardrail thresholds auditable in a single read.

// ── Memory fact limits ─────────────────────────────────────────────────────

/// Maximum stored length of a memory fact, in characters.
/// Longer candidates are truncated before any other sanitization step.
pub const MAX_FACT_CHARS: usize = 200;

// ── Turn loop limits ───────────────────────────────────────────────────────

/// Hard cap on model round-trips within a single assistant turn.
/// The primary defense against a model that requests tools forever.
pub const MAX_TOOL_ROUNDS: u32 = 5;

/// How many recent stored messages are replayed into the model context.
pub const CHAT_CONTEXT_MESSAGES: i64 = 50;

// ── Compaction triggers ────────────────────────────────────────────────────
// A conversation is compacted into durable facts when EITHER threshold is
// crossed. Both are checked from one snapshot per turn-completion event.

/// Messages accumulated since the last compaction before a run triggers.
pub const COMPACTION_MESSAGE_THRESHOLD: i64 = 10;

/// Hours since the last compaction before a run triggers regardless of
/// message volume.
pub const COMPACTION_MAX_AGE_HOURS: i64 = 24;

/// How many recent messages the extraction prompt sees.
pub const COMPACTION_RECENT_MESSAGES: i64 = 30;

// ── Guardrail thresholds and fixed replies ─────────────────────────────────

/// Injection score at or above which the pre-call gate short-circuits the
/// turn without any model call. 25 = one High-severity match.
pub const ABUSE_SCORE_THRESHOLD: u32 = 25;

/// Fixed reply when the abuse gate trips. Never interpolated — the rejected
/// input must not echo back into the conversation.
pub const ABUSE_REDIRECT: &str = "Let's keep things in the kitchen! I'm a cooking assistant — ask me about \
     recipes, ingredients, techniques, or tell me about your dietary needs.";

/// Fixed reply when the topic classifier or output guardrail trips.
pub const OFFTOPIC_REDIRECT: &str = "I'm happiest talking about food! Ask me for a recipe, a substitution, \
     meal ideas, or anything else cooking-related.";

/// Fallback reply when the model produced no usable text (e.g. the tool
/// round cap was reached with an empty final response).
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry — I lost my train of thought there. Could you ask me that again?";
