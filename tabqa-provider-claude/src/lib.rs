//! Anthropic Claude LLM Provider
//!
//! Implements `LlmProvider` for the Anthropic Messages API: content-block
//! mapping for tool use, system-prompt extraction, and usage reporting.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use tabqa_core::provider::{
    LlmProvider, ProviderCallError, ProviderResponse, StopReason, TokenUsage,
};
use tabqa_core::types::{Message, MessageContent, Role, ToolCallRequest, ToolDefinition};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anthropic Claude provider.
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl ClaudeProvider {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or("https://api.anthropic.com").to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert internal messages to the Messages API format.
    ///
    /// The system turn becomes the top-level `system` field; tool calls and
    /// results become `tool_use` / `tool_result` content blocks.
    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> serde_json::Value {
        let mut system_prompt = String::new();
        let mut api_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let MessageContent::Text(ref t) = msg.content {
                        system_prompt = t.clone();
                    }
                }
                Role::User => {
                    if let MessageContent::Text(ref t) = msg.content {
                        api_messages.push(serde_json::json!({
                            "role": "user",
                            "content": t
                        }));
                    }
                }
                Role::Assistant => match &msg.content {
                    MessageContent::Text(t) => {
                        api_messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": t
                        }));
                    }
                    MessageContent::ToolCalls(calls) => {
                        let blocks: Vec<serde_json::Value> = calls
                            .iter()
                            .map(|c| {
                                serde_json::json!({
                                    "type": "tool_use",
                                    "id": c.id,
                                    "name": c.name,
                                    "input": c.arguments
                                })
                            })
                            .collect();
                        api_messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": blocks
                        }));
                    }
                    _ => {}
                },
                Role::Tool => {
                    if let MessageContent::ToolResult(ref r) = msg.content {
                        api_messages.push(serde_json::json!({
                            "role": "user",
                            "content": [{
                                "type": "tool_result",
                                "tool_use_id": r.tool_call_id,
                                "content": r.content,
                                "is_error": r.is_error
                            }]
                        }));
                    }
                }
            }
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": api_messages,
        });

        if !system_prompt.is_empty() {
            body["system"] = serde_json::json!(system_prompt);
        }

        if !tools.is_empty() {
            let api_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(api_tools);
        }

        body
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
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
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, url = %url, tools = tools.len(), "calling Claude API");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderCallError::transport(format!("Claude request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(
                ProviderCallError::http(status, format!("Claude API error (HTTP {status}): {body}"))
                    .into(),
            );
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .context("failed to parse Claude response")?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        if let Some(blocks) = parsed.get("content").and_then(|c| c.as_array()) {
            for block in blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            content.push_str(text);
                        }
                    }
                    Some("tool_use") => {
                        tool_calls.push(ToolCallRequest {
                            id: block
                                .get("id")
                                .and_then(|v| v.as_str())
                                .unwrap_or("")
                                .to_string(),
                            name: block
                                .get("name")
                                .and_then(|v| v.as_str())
                                .unwrap_or("")
                                .to_string(),
                            arguments: block.get("input").cloned().unwrap_or_default(),
                        });
                    }
                    _ => {}
                }
            }
        }

        let stop_reason = match parsed.get("stop_reason").and_then(|r| r.as_str()) {
            Some("end_turn") => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => {
                if tool_calls.is_empty() {
                    StopReason::EndTurn
                } else {
                    StopReason::ToolUse
                }
            }
        };

        let input_tokens = parsed
            .pointer("/usage/input_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let output_tokens = parsed
            .pointer("/usage/output_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(ProviderResponse {
            content,
            tool_calls,
            stop_reason,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens: input_tokens + output_tokens,
            },
        })
    }
}
