// ── Souschef Atoms: Core Types ─────────────────────────────────────────────
// The data structures that flow through the entire engine.
// They are independent of any specific AI provider.

use serde::{Deserialize, Serialize};

// ── Model / Provider Config ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Ollama,
    OpenRouter,
    Custom,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Ollama => "http://localhost:11434/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Custom => "",
        }
    }
}

// ── Messages ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Plain message with no tool-call plumbing.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// ── Tool Calling ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON string, exactly as the model emitted it.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Result of executing one tool call, matched back by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: String,
    pub success: bool,
}

// ── Provider completion response ───────────────────────────────────────────

/// Unified non-streaming completion from any provider.
/// A response carries text content, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// Model name confirmed by the API, when reported.
    pub model: Option<String>,
}

/// Token usage reported by the API (for metering).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

// ── Memory facts ───────────────────────────────────────────────────────────

/// Closed category taxonomy for stored facts. This is a version-stable
/// contract: tool schemas and the storage layer reject any other value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Allergy,
    Intolerance,
    Restriction,
    Equipment,
    Goal,
    Preference,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 6] = [
        MemoryCategory::Allergy,
        MemoryCategory::Intolerance,
        MemoryCategory::Restriction,
        MemoryCategory::Equipment,
        MemoryCategory::Goal,
        MemoryCategory::Preference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Allergy => "allergy",
            MemoryCategory::Intolerance => "intolerance",
            MemoryCategory::Restriction => "restriction",
            MemoryCategory::Equipment => "equipment",
            MemoryCategory::Goal => "goal",
            MemoryCategory::Preference => "preference",
        }
    }

    /// Strict parse — unknown values are rejected, never coerced.
    pub fn parse(s: &str) -> Option<MemoryCategory> {
        match s.trim().to_lowercase().as_str() {
            "allergy" => Some(MemoryCategory::Allergy),
            "intolerance" => Some(MemoryCategory::Intolerance),
            "restriction" => Some(MemoryCategory::Restriction),
            "equipment" => Some(MemoryCategory::Equipment),
            "goal" => Some(MemoryCategory::Goal),
            "preference" => Some(MemoryCategory::Preference),
            _ => None,
        }
    }
}

/// Extraction confidence. Only `High` is ever persisted — lower confidence
/// is discarded because a fabricated allergy is worse than a missed one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A single durable statement about a user's dietary profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: String,
    pub user_id: String,
    /// Sanitized, canonical form `"User <predicate>"`, ≤ 200 chars.
    pub fact: String,
    pub category: MemoryCategory,
    pub confidence: Confidence,
    pub extracted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_conversation_id: Option<String>,
}

// ── Conversations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

/// Consistent snapshot of a conversation's compaction state. The trigger
/// decision is a pure function of this struct — no ambient counters.
#[derive(Debug, Clone)]
pub struct ConversationMeta {
    /// Messages accumulated since the last compaction reset.
    pub messages_since_compaction: i64,
    /// Last successful compaction run; defaults to conversation creation.
    pub last_compaction_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub tool_calls_json: Option<String>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
    /// Structured recipe payload attached to an assistant reply, if any.
    pub recipe_json: Option<String>,
    pub created_at: String,
}

// ── Turn outcome (engine → caller) ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub reply: String,
    /// True when any guardrail replaced the reply with a fixed redirect.
    pub off_topic: bool,
    pub tool_calls_used: u32,
}

// ── Engine Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub providers: Vec<ProviderConfig>,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub default_system_prompt: Option<String>,
    pub max_tool_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            providers: vec![],
            default_provider: None,
            default_model: None,
            default_system_prompt: Some(
                "You are a friendly cooking assistant. You help with recipes, ingredients, \
                 substitutions, techniques, meal planning, and kitchen equipment — and nothing else. \
                 Politely decline anything unrelated to food and steer back to cooking.\n\n\
                 You have memory tools for the user's dietary profile:\n\
                 - **list_user_memories**: review what you know before suggesting recipes.\n\
                 - **add_user_memory**: save allergies, intolerances, restrictions, equipment, \
                 goals, and preferences the user states. Phrase facts as \"User ...\".\n\
                 - **update_user_memory** / **remove_user_memory**: keep the profile current when \
                 the user corrects you.\n\
                 Always respect stored allergies and restrictions without being asked."
                    .into(),
            ),
            max_tool_rounds: crate::atoms::constants::MAX_TOOL_ROUNDS,
        }
    }
}

// ── String helpers ─────────────────────────────────────────────────────────

/// Truncate to at most `max_chars` characters without splitting a char.
/// Returns a borrowed slice — callers own the decision to allocate.
pub fn truncate_utf8(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_closed() {
        assert_eq!(MemoryCategory::parse("allergy"), Some(MemoryCategory::Allergy));
        assert_eq!(MemoryCategory::parse(" Equipment "), Some(MemoryCategory::Equipment));
        assert_eq!(MemoryCategory::parse("favorite"), None);
        assert_eq!(MemoryCategory::parse(""), None);
    }

    #[test]
    fn test_truncate_utf8_char_boundary() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // Multibyte: must not split the char
        assert_eq!(truncate_utf8("crème brûlée", 5), "crème");
    }
}
