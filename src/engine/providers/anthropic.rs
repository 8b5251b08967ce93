// Souschef Engine — Anthropic Claude Provider
// Implements the AiProvider golden trait. All Messages-API wire-format
// translation (system extraction, tool_use / tool_result blocks) lives here.

use crate::atoms::traits::{AiProvider, ProviderError};
use crate::atoms::types::{
    Completion, FunctionCall, Message, ProviderConfig, ProviderKind, Role, TokenUsage, ToolCall,
    ToolDefinition, truncate_utf8,
};
use crate::engine::http::{is_retryable_status, parse_retry_after, retry_delay, MAX_RETRIES};
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 4096;

// ── Struct ─────────────────────────────────────────────────────────────────

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.kind.default_base_url().to_string());
        AnthropicProvider {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key: config.api_key.clone(),
        }
    }

    /// Split out the system prompt and convert the rest to Anthropic's
    /// message shape. Tool results ride as user-role tool_result blocks;
    /// assistant tool calls become tool_use content blocks.
    fn format_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system = None;
        let mut formatted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    system = Some(msg.content.clone());
                }
                Role::Tool => {
                    if let Some(tc_id) = &msg.tool_call_id {
                        formatted.push(json!({
                            "role": "user",
                            "content": [{
                                "type": "tool_result",
                                "tool_use_id": tc_id,
                                "content": msg.content,
                            }]
                        }));
                    }
                }
                Role::Assistant => {
                    if let Some(tool_calls) = &msg.tool_calls {
                        let mut blocks: Vec<Value> = vec![];
                        if !msg.content.is_empty() {
                            blocks.push(json!({"type": "text", "text": msg.content}));
                        }
                        for tc in tool_calls {
                            let input: Value =
                                serde_json::from_str(&tc.function.arguments).unwrap_or(json!({}));
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.function.name,
                                "input": input,
                            }));
                        }
                        formatted.push(json!({"role": "assistant", "content": blocks}));
                    } else {
                        formatted.push(json!({"role": "assistant", "content": msg.content}));
                    }
                }
                Role::User => {
                    formatted.push(json!({"role": "user", "content": msg.content}));
                }
            }
        }

        (system, formatted)
    }

    fn format_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.function.name,
                    "description": t.function.description,
                    "input_schema": t.function.parameters,
                })
            })
            .collect()
    }

    /// Parse a non-streaming Messages API response body.
    fn parse_completion(v: &Value) -> Completion {
        let model = v["model"].as_str().map(|s| s.to_string());

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        if let Some(blocks) = v["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(t) = block["text"].as_str() {
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        let name = block["name"].as_str().unwrap_or_default();
                        if name.is_empty() {
                            continue;
                        }
                        tool_calls.push(ToolCall {
                            id: block["id"]
                                .as_str()
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4())),
                            call_type: "function".into(),
                            function: FunctionCall {
                                name: name.to_string(),
                                arguments: block["input"].to_string(),
                            },
                        });
                    }
                    _ => {}
                }
            }
        }

        let usage = v.get("usage").and_then(|u| {
            let input = u["input_tokens"].as_u64().unwrap_or(0);
            let output = u["output_tokens"].as_u64().unwrap_or(0);
            if input > 0 || output > 0 {
                Some(TokenUsage {
                    input_tokens: input,
                    output_tokens: output,
                    total_tokens: input + output,
                })
            } else {
                None
            }
        });

        Completion {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            usage,
            model,
        }
    }
}

// ── AiProvider implementation ──────────────────────────────────────────────

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        temperature: Option<f64>,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let (system, formatted) = Self::format_messages(messages);

        let mut body = json!({
            "model": model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": formatted,
        });
        if let Some(sys) = system {
            body["system"] = json!(sys);
        }
        if !tools.is_empty() {
            body["tools"] = json!(Self::format_tools(tools));
        }
        if let Some(temp) = temperature {
            body["temperature"] = json!(temp);
        }

        info!("[engine] Anthropic request to {} model={}", url, model);

        let mut last_error = String::new();
        let mut last_status: u16 = 0;
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!(
                    "[engine] Anthropic retry {}/{} after {}ms",
                    attempt,
                    MAX_RETRIES,
                    delay.as_millis()
                );
            }

            let response = match self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("HTTP request failed: {}", e);
                    last_status = 0;
                    if attempt < MAX_RETRIES {
                        continue;
                    }
                    return Err(ProviderError::Transport(last_error));
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                last_status = status;
                retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let body_text = response.text().await.unwrap_or_default();
                last_error = format!("API error {}: {}", status, truncate_utf8(&body_text, 200));
                error!(
                    "[engine] Anthropic error {}: {}",
                    status,
                    truncate_utf8(&body_text, 500)
                );

                if status == 401 || status == 403 {
                    return Err(ProviderError::Auth(last_error));
                }
                if is_retryable_status(status) && attempt < MAX_RETRIES {
                    continue;
                }
                return if status == 429 {
                    Err(ProviderError::RateLimited {
                        message: last_error,
                        retry_after_secs: retry_after.take(),
                    })
                } else {
                    Err(ProviderError::Api {
                        status,
                        message: last_error,
                    })
                };
            }

            let v: Value = response
                .json()
                .await
                .map_err(|e| ProviderError::Transport(format!("Body read error: {}", e)))?;
            return Ok(Self::parse_completion(&v));
        }

        match last_status {
            0 => Err(ProviderError::Transport(last_error)),
            429 => Err(ProviderError::RateLimited {
                message: last_error,
                retry_after_secs: retry_after,
            }),
            s => Err(ProviderError::Api {
                status: s,
                message: last_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_extracted() {
        let messages = vec![
            Message::text(Role::System, "You are a cooking assistant."),
            Message::text(Role::User, "What goes with risotto?"),
        ];
        let (system, formatted) = AnthropicProvider::format_messages(&messages);
        assert_eq!(system.as_deref(), Some("You are a cooking assistant."));
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0]["role"], "user");
    }

    #[test]
    fn test_tool_result_rides_as_user_block() {
        let mut msg = Message::text(Role::Tool, "Removed memory: \"User dislikes cilantro\"");
        msg.tool_call_id = Some("toolu_1".into());
        let (_, formatted) = AnthropicProvider::format_messages(&[msg]);
        assert_eq!(formatted[0]["role"], "user");
        assert_eq!(formatted[0]["content"][0]["type"], "tool_result");
        assert_eq!(formatted[0]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_parse_tool_use_blocks() {
        let v = json!({
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "Noting that down."},
                {"type": "tool_use", "id": "toolu_9", "name": "add_user_memory",
                 "input": {"fact": "User has an air fryer", "category": "equipment"}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });
        let c = AnthropicProvider::parse_completion(&v);
        assert_eq!(c.content.as_deref(), Some("Noting that down."));
        assert_eq!(c.tool_calls.len(), 1);
        let args: Value = serde_json::from_str(&c.tool_calls[0].function.arguments).unwrap();
        assert_eq!(args["category"], "equipment");
    }
}
