//! LLM Provider Trait and Types
//!
//! Defines the `LlmProvider` capability the orchestration loop is written
//! against, plus the provider-agnostic response and usage types. One adapter
//! crate per backend implements this trait; the loop never branches on the
//! provider.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCallRequest, ToolDefinition};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Token usage for a single provider call.
///
/// All-zero when the response did not report usage; the accountant treats
/// that as a no-op, never an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Final text answer; the conversation round is complete.
    EndTurn,
    /// The model wants tool results before continuing.
    ToolUse,
    /// Output was truncated by the provider's length limit.
    MaxTokens,
    StopSequence,
    Error,
}

/// Response from a provider `complete()` call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Text content (may be empty when only tool calls were returned).
    pub content: String,
    /// Tool calls requested by the model, in emission order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage reported by the provider.
    pub usage: TokenUsage,
}

/// Structured failure from a provider call.
///
/// Adapters attach the HTTP status when they have one so the retry layer
/// can tell transient failures (429, 5xx) from fatal ones (auth, bad
/// request) without parsing error text.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProviderCallError {
    /// HTTP status of the failed call, when the request got that far.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderCallError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Capability implemented by each model backend adapter.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "openai", "claude").
    fn name(&self) -> &str;

    /// The model this provider instance is configured for.
    fn model(&self) -> &str;

    /// Send the transcript and tool schemas, receive the model's next turn.
    ///
    /// Passing an empty `tools` slice disables tool use for this call;
    /// the loop uses that for the forced final text answer.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse>;
}
