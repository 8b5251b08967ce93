// ── Souschef Atoms: Provider Trait ─────────────────────────────────────────
// The golden trait every AI backend implements, plus the classified error
// type providers return. Concrete implementations live in engine/providers/.

use crate::atoms::types::{Completion, Message, ProviderKind, ToolDefinition};
use async_trait::async_trait;
use thiserror::Error;

// ── Provider error classification ──────────────────────────────────────────
// The agent loop treats Transport / RateLimited / retryable Api statuses as
// "try again later" failures; Auth and other Api errors are terminal.

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, DNS, or stream-level failure before an HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// 401 / 403 — never retried.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// 429 with optional server-suggested backoff.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl ProviderError {
    /// True when retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::RateLimited { .. } => true,
            ProviderError::Auth(_) => false,
            ProviderError::Api { status, .. } => {
                matches!(status, 500 | 502 | 503 | 504 | 529)
            }
        }
    }
}

// ── The golden trait ───────────────────────────────────────────────────────

/// A chat-completion backend. One synchronous request/response round-trip:
/// full message list in, final content and/or tool calls out.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name for logging ("openai", "anthropic", …).
    fn name(&self) -> &str;

    /// The ProviderKind discriminant of this backend.
    fn kind(&self) -> ProviderKind;

    /// Send one completion request. `tools` may be empty (plain text call).
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        temperature: Option<f64>,
    ) -> Result<Completion, ProviderError>;
}
