// engine/state.rs — Shared engine state and model-routing helpers.
// Canonical home for EngineState: the session store plus the persisted
// engine configuration.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{EngineConfig, ProviderConfig, ProviderKind};
use crate::engine::sessions::SessionStore;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

/// Config row key in the engine_config table.
const ENGINE_CONFIG_KEY: &str = "engine_config";

/// Fallback chat model when nothing is configured.
const FALLBACK_MODEL: &str = "gpt-4o-mini";

// ── Model routing ──────────────────────────────────────────────────────────

/// Resolve the provider for a model name: exact default_model match first,
/// then well-known name prefixes, then Ollama-style `name:tag` locals.
pub fn resolve_provider_for_model(
    model: &str,
    providers: &[ProviderConfig],
) -> Option<ProviderConfig> {
    if let Some(p) = providers
        .iter()
        .find(|p| p.default_model.as_deref() == Some(model))
    {
        return Some(p.clone());
    }

    if model.starts_with("claude") || model.starts_with("anthropic") {
        providers
            .iter()
            .find(|p| p.kind == ProviderKind::Anthropic)
            .cloned()
    } else if model.starts_with("gpt")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
    {
        providers
            .iter()
            .find(|p| p.kind == ProviderKind::OpenAI)
            .cloned()
    } else if model.contains(':')
        || model.starts_with("llama")
        || model.starts_with("qwen")
        || model.starts_with("gemma")
        || model.starts_with("mistral")
    {
        // Local model names in Ollama's name:tag format or known families.
        providers
            .iter()
            .find(|p| p.kind == ProviderKind::Ollama)
            .cloned()
    } else {
        None
    }
}

// ── Engine state ───────────────────────────────────────────────────────────

pub struct EngineState {
    pub store: Arc<SessionStore>,
    pub config: Mutex<EngineConfig>,
}

impl EngineState {
    pub fn new() -> EngineResult<Self> {
        Self::with_store(SessionStore::open()?)
    }

    /// In-memory state for tests — full schema, no disk.
    pub fn in_memory() -> EngineResult<Self> {
        Self::with_store(SessionStore::open_in_memory()?)
    }

    fn with_store(store: SessionStore) -> EngineResult<Self> {
        // Load config from DB or fall back to defaults.
        let config = match store.get_config(ENGINE_CONFIG_KEY) {
            Ok(Some(json)) => serde_json::from_str::<EngineConfig>(&json).unwrap_or_default(),
            _ => EngineConfig::default(),
        };
        info!(
            "[engine] State initialized ({} providers configured)",
            config.providers.len()
        );
        Ok(EngineState {
            store: Arc::new(store),
            config: Mutex::new(config),
        })
    }

    /// Persist the current configuration back to the store.
    pub fn save_config(&self) -> EngineResult<()> {
        let json = serde_json::to_string(&*self.config.lock())?;
        self.store.set_config(ENGINE_CONFIG_KEY, &json)
    }

    /// The chat model to use for turns and compaction.
    pub fn chat_model(&self) -> String {
        self.config
            .lock()
            .default_model
            .clone()
            .unwrap_or_else(|| FALLBACK_MODEL.to_string())
    }

    pub fn system_prompt(&self) -> Option<String> {
        self.config.lock().default_system_prompt.clone()
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.config.lock().max_tool_rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            kind,
            api_key: "k".into(),
            base_url: None,
            default_model: None,
        }
    }

    #[test]
    fn test_resolve_by_prefix() {
        let providers = vec![
            provider("oa", ProviderKind::OpenAI),
            provider("an", ProviderKind::Anthropic),
            provider("ol", ProviderKind::Ollama),
        ];
        assert_eq!(
            resolve_provider_for_model("claude-sonnet-4-5", &providers).map(|p| p.id),
            Some("an".into())
        );
        assert_eq!(
            resolve_provider_for_model("gpt-4o-mini", &providers).map(|p| p.id),
            Some("oa".into())
        );
        assert_eq!(
            resolve_provider_for_model("llama3:8b", &providers).map(|p| p.id),
            Some("ol".into())
        );
        assert!(resolve_provider_for_model("mystery-model", &providers).is_none());
    }

    #[test]
    fn test_config_persists_through_state() {
        let state = EngineState::in_memory().unwrap();
        state.config.lock().default_model = Some("gpt-4o".into());
        state.save_config().unwrap();
        let raw = state.store.get_config("engine_config").unwrap().unwrap();
        assert!(raw.contains("gpt-4o"));
        assert_eq!(state.chat_model(), "gpt-4o");
    }
}
