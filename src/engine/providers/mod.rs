// Souschef Engine — AI Provider Registry
// AnyProvider wraps Arc<dyn AiProvider> so adding a new provider never
// requires modifying callers — just implement the trait. Arc (not Box)
// because the compaction task needs a cheap clone to carry across a spawn.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::AiProvider;
use crate::atoms::types::{Completion, Message, ProviderConfig, ProviderKind, ToolDefinition};
use std::sync::Arc;

// ── Provider factory ───────────────────────────────────────────────────────

/// Type-erased AI provider. Callers hold `AnyProvider` and call
/// `.complete()` without knowing which concrete backend is in use.
#[derive(Clone)]
pub struct AnyProvider(Arc<dyn AiProvider>);

impl AnyProvider {
    /// Construct the right concrete provider from a `ProviderConfig`.
    ///
    /// To add a new OpenAI-compatible backend: add the ProviderKind variant
    /// and its default_base_url() — the `_` arm here handles the rest.
    /// A backend with a unique wire format gets its own module + match arm.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let provider: Arc<dyn AiProvider> = match config.kind {
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)),
            // OpenAI, Ollama, OpenRouter, Custom all speak the OpenAI wire format.
            _ => Arc::new(OpenAiProvider::new(config)),
        };
        AnyProvider(provider)
    }

    /// Wrap an arbitrary implementation — used by tests to inject a
    /// scripted backend.
    pub fn from_impl(provider: Arc<dyn AiProvider>) -> Self {
        AnyProvider(provider)
    }

    /// One completion round-trip, with the classified provider failure
    /// lifted into `EngineError::Provider`.
    pub async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        temperature: Option<f64>,
    ) -> EngineResult<Completion> {
        let name = self.0.name().to_string();
        self.0
            .complete(messages, tools, model, temperature)
            .await
            .map_err(|e| EngineError::provider(name, e))
    }

    /// The ProviderKind discriminant of the underlying provider.
    pub fn kind(&self) -> ProviderKind {
        self.0.kind()
    }
}
