// Souschef Engine — OpenAI-Compatible Provider
// Handles: OpenAI, OpenRouter, Ollama, and any OpenAI-compatible REST API.
// Implements the AiProvider golden trait with a non-streaming round-trip.

use crate::atoms::traits::{AiProvider, ProviderError};
use crate::atoms::types::{
    Completion, FunctionCall, Message, ProviderConfig, ProviderKind, TokenUsage, ToolCall,
    ToolDefinition, truncate_utf8,
};
use crate::engine::http::{is_retryable_status, parse_retry_after, retry_delay, MAX_RETRIES};
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

// ── Struct ─────────────────────────────────────────────────────────────────

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    kind: ProviderKind,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.kind.default_base_url().to_string());
        OpenAiProvider {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key: config.api_key.clone(),
            kind: config.kind,
        }
    }

    fn format_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut m = json!({
                    "role": msg.role,
                    "content": msg.content,
                });
                if let Some(tc) = &msg.tool_calls {
                    m["tool_calls"] = json!(tc);
                }
                if let Some(id) = &msg.tool_call_id {
                    m["tool_call_id"] = json!(id);
                }
                if let Some(name) = &msg.name {
                    m["name"] = json!(name);
                }
                m
            })
            .collect()
    }

    fn format_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": t.tool_type,
                    "function": {
                        "name": t.function.name,
                        "description": t.function.description,
                        "parameters": t.function.parameters,
                    }
                })
            })
            .collect()
    }

    /// Parse a non-streaming chat completion body.
    fn parse_completion(v: &Value) -> Completion {
        let model = v["model"].as_str().map(|s| s.to_string());
        let message = &v["choices"][0]["message"];

        let content = message["content"].as_str().map(|s| s.to_string());

        let mut tool_calls = Vec::new();
        if let Some(tcs) = message["tool_calls"].as_array() {
            for tc in tcs {
                let name = tc["function"]["name"].as_str().unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                tool_calls.push(ToolCall {
                    id: tc["id"]
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4())),
                    call_type: "function".into(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: tc["function"]["arguments"]
                            .as_str()
                            .unwrap_or("{}")
                            .to_string(),
                    },
                });
            }
        }

        let usage = v.get("usage").and_then(|u| {
            let input = u["prompt_tokens"].as_u64().unwrap_or(0);
            let output = u["completion_tokens"].as_u64().unwrap_or(0);
            if input > 0 || output > 0 {
                Some(TokenUsage {
                    input_tokens: input,
                    output_tokens: output,
                    total_tokens: u["total_tokens"].as_u64().unwrap_or(input + output),
                })
            } else {
                None
            }
        });

        Completion {
            content,
            tool_calls,
            usage,
            model,
        }
    }
}

// ── AiProvider implementation ──────────────────────────────────────────────

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        temperature: Option<f64>,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut body = json!({
            "model": model,
            "messages": Self::format_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::format_tools(tools));
        }
        if let Some(temp) = temperature {
            body["temperature"] = json!(temp);
        }

        info!("[engine] OpenAI request to {} model={}", url, model);

        // Retry loop for transient errors
        let mut last_error = String::new();
        let mut last_status: u16 = 0;
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!(
                    "[engine] OpenAI retry {}/{} after {}ms",
                    attempt,
                    MAX_RETRIES,
                    delay.as_millis()
                );
            }

            let response = match self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
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
                // Parse Retry-After before consuming the body
                retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let body_text = response.text().await.unwrap_or_default();
                last_error = format!("API error {}: {}", status, truncate_utf8(&body_text, 200));
                error!(
                    "[engine] OpenAI error {}: {}",
                    status,
                    truncate_utf8(&body_text, 500)
                );

                // Auth errors are never retried
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

        // All retries exhausted — classify the last error
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
