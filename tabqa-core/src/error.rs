//! Agent Error Types
//!
//! The typed failure surface of `ask()`. Tool failures never appear here;
//! they are recovered locally as error envelopes the model can react to.

/// Unified error type surfaced to callers of the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The provider call itself failed (network, auth, rate limit) after the
    /// bounded retry was exhausted.
    #[error("provider error: {message}")]
    Provider { message: String },

    /// The caller-specified deadline elapsed mid-conversation.
    #[error("question timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Tool-layer failure outside the per-call envelope path
    /// (construction-time misconfiguration only).
    #[error("tool error: {message}")]
    Tool { message: String },

    /// Missing or invalid configuration, detected before any conversation
    /// starts.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl AgentError {
    /// Machine-readable failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Provider { .. } => "provider_error",
            AgentError::Timeout { .. } => "timeout",
            AgentError::Tool { .. } => "tool_error",
            AgentError::Config { .. } => "configuration_error",
        }
    }
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, AgentError>;
