// ── Souschef Atoms: Error Types ────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Provider, Tool…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Guardrail trips and sanitizer rejections are NOT errors — they are
//     structured negative results on their own types. Only genuine failures
//     (store, network, provider) travel through this enum.
//   • No variant carries secret material (API keys) in its message.

use crate::atoms::traits::ProviderError;
use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Primary completion call failure. Carries the classified provider
    /// error so callers can distinguish a retryable transport/rate-limit
    /// failure from a non-retryable API rejection.
    #[error("Provider error: {provider}: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// Tool execution failure that escaped the per-call boundary.
    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    /// Engine configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create a provider error with name and classified source.
    pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }

    /// Create a tool error with name and message.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Provider { source, .. } => source.is_retryable(),
            EngineError::Network(_) => true,
            _ => false,
        }
    }
}

// ── Migration bridge: String → EngineError ─────────────────────────────────
// Allows `?` on functions still returning `Result<T, String>` inside
// functions that return `EngineResult<T>`.

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
pub type EngineResult<T> = Result<T, EngineError>;

// ── Conversion: EngineError → String ───────────────────────────────────────
// Lets host boundaries with `Result<T, String>` call `.map_err(EngineError::into)`.

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}
