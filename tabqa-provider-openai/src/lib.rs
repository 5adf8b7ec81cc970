//! OpenAI LLM Provider
//!
//! Implements `LlmProvider` for the OpenAI Chat Completions API, including
//! tool use (function calling) and usage extraction. Also works against
//! OpenAI-compatible endpoints via a custom base URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use tabqa_core::provider::{
    LlmProvider, ProviderCallError, ProviderResponse, StopReason, TokenUsage,
};
use tabqa_core::types::{Message, MessageContent, Role, ToolCallRequest, ToolDefinition};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI Chat Completions provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or("https://api.openai.com").to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert internal messages to the Chat Completions wire format.
    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter_map(|msg| match msg.role {
                Role::System => match &msg.content {
                    MessageContent::Text(t) => Some(serde_json::json!({
                        "role": "system",
                        "content": t
                    })),
                    _ => None,
                },
                Role::User => match &msg.content {
                    MessageContent::Text(t) => Some(serde_json::json!({
                        "role": "user",
                        "content": t
                    })),
                    _ => None,
                },
                Role::Assistant => match &msg.content {
                    MessageContent::Text(t) => Some(serde_json::json!({
                        "role": "assistant",
                        "content": t
                    })),
                    MessageContent::ToolCalls(calls) => {
                        let tool_calls: Vec<serde_json::Value> = calls
                            .iter()
                            .map(|c| {
                                serde_json::json!({
                                    "id": c.id,
                                    "type": "function",
                                    "function": {
                                        "name": c.name,
                                        "arguments": c.arguments.to_string()
                                    }
                                })
                            })
                            .collect();
                        Some(serde_json::json!({
                            "role": "assistant",
                            "tool_calls": tool_calls
                        }))
                    }
                    _ => None,
                },
                Role::Tool => match &msg.content {
                    MessageContent::ToolResult(r) => Some(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": r.tool_call_id,
                        "content": r.content
                    })),
                    _ => None,
                },
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
        });

        if !tools.is_empty() {
            let api_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(api_tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse> {
        let body = self.build_request_body(messages, tools);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %self.model, url = %url, tools = tools.len(), "calling OpenAI API");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderCallError::transport(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(
                ProviderCallError::http(status, format!("OpenAI API error (HTTP {status}): {body}"))
                    .into(),
            );
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        let choice = parsed
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first());
        let message = choice.and_then(|c| c.get("message"));

        let content = message
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let tool_calls: Vec<ToolCallRequest> = message
            .and_then(|m| m.get("tool_calls"))
            .and_then(|tc| tc.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|tc| {
                        let func = tc.get("function")?;
                        Some(ToolCallRequest {
                            id: tc.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                            name: func
                                .get("name")
                                .and_then(|n| n.as_str())
                                .unwrap_or("")
                                .to_string(),
                            // Arguments arrive as a JSON-encoded string.
                            arguments: func
                                .get("arguments")
                                .and_then(|a| a.as_str())
                                .and_then(|s| serde_json::from_str(s).ok())
                                .unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(|r| r.as_str());

        let stop_reason = match finish_reason {
            Some("stop") => StopReason::EndTurn,
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => {
                if tool_calls.is_empty() {
                    StopReason::EndTurn
                } else {
                    StopReason::ToolUse
                }
            }
        };

        // Usage may be absent; all-zero usage is a recorded no-op upstream.
        let usage = TokenUsage {
            input_tokens: parsed
                .pointer("/usage/prompt_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            output_tokens: parsed
                .pointer("/usage/completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            total_tokens: parsed
                .pointer("/usage/total_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        };

        Ok(ProviderResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        })
    }
}
