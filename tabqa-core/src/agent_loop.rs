//! Orchestration Loop
//!
//! The round-bounded tool-calling state machine: send the transcript to the
//! model, execute any requested tools, feed results back, repeat. The loop
//! moves between awaiting-model and dispatching-tools until it finishes with
//! text or aborts on a provider failure.
//!
//! Termination is guaranteed: after `max_rounds` rounds of tool calls the
//! loop makes one final call with tool use disabled, so the caller always
//! receives text, and at most `max_rounds + 1` provider calls are made per
//! question.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::executor::ToolExecutor;
use crate::provider::{LlmProvider, ProviderResponse, StopReason};
use crate::registry;
use crate::retry::{with_retry, RetryPolicy};
use crate::transcript::Transcript;
use crate::types::{Message, ToolCallRequest, ToolCallResult, ToolDefinition};
use crate::usage::UsageTracker;

/// Returned when the model produced neither text nor tool calls.
pub const NO_ANSWER_FALLBACK: &str = "I couldn't find an answer to your question.";

/// Returned when the round budget ran out and the forced final call still
/// produced no text.
pub const EXHAUSTED_FALLBACK: &str =
    "I've analyzed the data but couldn't formulate a final answer.";

// ---------------------------------------------------------------------------
// Loop configuration and outcome
// ---------------------------------------------------------------------------

/// Configuration for one run of the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum tool-calling rounds before the forced final answer.
    pub max_rounds: u32,
    /// Retry policy for provider calls.
    pub retry: RetryPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a finished loop run.
#[derive(Debug)]
pub struct LoopOutcome {
    /// The final answer text. Never empty.
    pub answer: String,
    /// Rounds entered (provider calls made with tools enabled).
    pub rounds: u32,
    /// Total provider calls, including the forced final one if it happened.
    pub provider_calls: u32,
}

// ---------------------------------------------------------------------------
// The loop
// ---------------------------------------------------------------------------

/// Drive one question to completion over a seeded transcript.
///
/// Tool failures never abort: they flow back to the model as error
/// envelopes. Only provider-level failures (after bounded retry) abort.
pub async fn run_loop(
    provider: &dyn LlmProvider,
    executor: &ToolExecutor,
    transcript: &mut Transcript,
    usage: &mut UsageTracker,
    config: &LoopConfig,
) -> Result<LoopOutcome, AgentError> {
    let tools = registry::definitions();
    let mut provider_calls = 0u32;

    for round in 1..=config.max_rounds {
        debug!(round, "awaiting model");
        let response =
            call_provider(provider, transcript.messages(), &tools, &config.retry).await?;
        provider_calls += 1;
        usage.record(response.usage);

        if !response.content.is_empty() {
            transcript.push_assistant_text(&response.content);
        }

        if response.tool_calls.is_empty() {
            info!(round, "model finished with a text answer");
            return Ok(LoopOutcome {
                answer: answer_text(&response),
                rounds: round,
                provider_calls,
            });
        }

        if response.stop_reason == StopReason::MaxTokens {
            // Truncated mid-emission; the tool calls cannot be trusted.
            warn!(round, "response truncated by length limit, finishing early");
            return Ok(LoopOutcome {
                answer: answer_text(&response),
                rounds: round,
                provider_calls,
            });
        }

        info!(
            round,
            tool_calls = response.tool_calls.len(),
            "dispatching tool calls"
        );

        let calls = sanitize_calls(response.tool_calls);
        transcript.push_tool_calls(calls.clone());
        let results = execute_calls(executor, &calls).await;
        transcript.push_tool_results(results);
    }

    // Round budget exhausted: one final call with tool use disabled forces
    // the model to answer from the results it already has.
    warn!(
        max_rounds = config.max_rounds,
        "round budget exhausted, forcing final answer"
    );
    let response = call_provider(provider, transcript.messages(), &[], &config.retry).await?;
    provider_calls += 1;
    usage.record(response.usage);

    if !response.content.is_empty() {
        transcript.push_assistant_text(&response.content);
    }

    let answer = if response.content.is_empty() {
        EXHAUSTED_FALLBACK.to_string()
    } else {
        response.content
    };

    Ok(LoopOutcome {
        answer,
        rounds: config.max_rounds,
        provider_calls,
    })
}

fn answer_text(response: &ProviderResponse) -> String {
    if response.content.is_empty() {
        NO_ANSWER_FALLBACK.to_string()
    } else {
        response.content.clone()
    }
}

/// Null arguments are normalized to empty objects before dispatch and before
/// entering the transcript, so replayed conversations stay well-formed.
fn sanitize_calls(calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .map(|call| {
            let arguments = if call.arguments.is_null() {
                json!({})
            } else {
                call.arguments
            };
            ToolCallRequest {
                id: call.id,
                name: call.name,
                arguments,
            }
        })
        .collect()
}

async fn call_provider(
    provider: &dyn LlmProvider,
    messages: &[Message],
    tools: &[ToolDefinition],
    retry: &RetryPolicy,
) -> Result<ProviderResponse, AgentError> {
    with_retry(retry, "provider.complete", || {
        provider.complete(messages, tools)
    })
    .await
    .map_err(|e| AgentError::Provider {
        message: format!("{e:#}"),
    })
}

/// Execute every tool call of one assistant turn.
///
/// Calls run concurrently on the blocking pool, but results are collected
/// in call-emission order; concurrency never reorders the transcript.
async fn execute_calls(executor: &ToolExecutor, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
    let handles: Vec<_> = calls
        .iter()
        .map(|call| {
            let executor = executor.clone();
            let call = call.clone();
            tokio::task::spawn_blocking(move || executor.execute(&call))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (handle, call) in handles.into_iter().zip(calls) {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, err = %e, "tool execution task failed");
                ToolCallResult {
                    tool_call_id: call.id.clone(),
                    content: json!({
                        "success": false,
                        "error": format!("tool execution failed: {e}"),
                    })
                    .to_string(),
                    is_error: true,
                }
            }
        };
        results.push(result);
    }
    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FileBinding;
    use crate::provider::TokenUsage;
    use crate::usage::ModelPrice;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Provider scripted with a fixed sequence of responses.
    struct ScriptedProvider {
        responses: Mutex<Vec<ProviderResponse>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ProviderResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted-model"
        }
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<ProviderResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(text_response("done"))
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn text_response(text: &str) -> ProviderResponse {
        ProviderResponse {
            content: text.to_string(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    fn tool_response(calls: Vec<(&str, &str)>) -> ProviderResponse {
        ProviderResponse {
            content: String::new(),
            tool_calls: calls
                .into_iter()
                .map(|(id, name)| ToolCallRequest {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: json!({}),
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    fn test_executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(FileBinding::from_paths(Vec::<String>::new())))
    }

    fn seeded_transcript() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.seed("preamble", "question");
        transcript
    }

    #[tokio::test]
    async fn text_only_response_finishes_in_one_round() {
        let provider = ScriptedProvider::new(vec![text_response("The file has 21 records.")]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, "The file has 21 records.");
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.provider_calls, 1);
        assert_eq!(usage.snapshot().total_tokens, 15);
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![("call_1", "list_available_files")]),
            text_response("No files are bound."),
        ]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.provider_calls, 2);
        // system, user, tool-calls, tool-result, assistant
        assert_eq!(transcript.message_count(), 5);
        assert!(transcript.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_does_not_abort() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![("call_1", "summon_demons")]),
            text_response("That tool is unavailable."),
        ]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, "That tool is unavailable.");
        assert!(transcript.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn results_keep_emission_order() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![
                ("call_a", "list_available_files"),
                ("call_b", "nonexistent_tool"),
                ("call_c", "list_available_files"),
            ]),
            text_response("ok"),
        ]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        let result_ids: Vec<String> = transcript
            .messages()
            .iter()
            .filter_map(|m| match &m.content {
                crate::types::MessageContent::ToolResult(r) => Some(r.tool_call_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(result_ids, vec!["call_a", "call_b", "call_c"]);
    }

    #[tokio::test]
    async fn round_cap_forces_final_text_answer() {
        // A provider that always asks for tools never converges on its own.
        struct AlwaysTools {
            calls: AtomicU32,
            last_tool_count: AtomicU32,
        }

        #[async_trait]
        impl LlmProvider for AlwaysTools {
            fn name(&self) -> &str {
                "always-tools"
            }
            fn model(&self) -> &str {
                "m"
            }
            async fn complete(
                &self,
                _messages: &[Message],
                tools: &[ToolDefinition],
            ) -> Result<ProviderResponse> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.last_tool_count
                    .store(tools.len() as u32, Ordering::SeqCst);
                if tools.is_empty() {
                    // Tool use disabled: the forced final call.
                    Ok(text_response("forced summary"))
                } else {
                    Ok(tool_response(vec![("c", "list_available_files")]))
                }
            }
        }

        let provider = AlwaysTools {
            calls: AtomicU32::new(0),
            last_tool_count: AtomicU32::new(0),
        };
        let config = LoopConfig {
            max_rounds: 3,
            retry: RetryPolicy::default(),
        };
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, "forced summary");
        assert!(!outcome.answer.is_empty());
        assert_eq!(outcome.provider_calls, 4); // max_rounds + 1
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
        assert_eq!(provider.last_tool_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn truncation_returns_partial_text() {
        let provider = ScriptedProvider::new(vec![ProviderResponse {
            content: "Partial ans".to_string(),
            tool_calls: vec![ToolCallRequest {
                id: "t".into(),
                name: "read_table".into(),
                arguments: json!(null),
            }],
            stop_reason: StopReason::MaxTokens,
            usage: TokenUsage::default(),
        }]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, "Partial ans");
        assert_eq!(outcome.provider_calls, 1);
    }

    #[tokio::test]
    async fn empty_response_yields_fallback_text() {
        let provider = ScriptedProvider::new(vec![ProviderResponse {
            content: String::new(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }]);
        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let outcome = run_loop(
            &provider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn provider_failure_aborts_with_typed_error() {
        struct FailingProvider;

        #[async_trait]
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            fn model(&self) -> &str {
                "m"
            }
            async fn complete(
                &self,
                _messages: &[Message],
                _tools: &[ToolDefinition],
            ) -> Result<ProviderResponse> {
                Err(anyhow::Error::new(
                    crate::provider::ProviderCallError::http(401, "invalid api key"),
                ))
            }
        }

        let mut transcript = seeded_transcript();
        let mut usage = UsageTracker::new(ModelPrice::default());

        let err = run_loop(
            &FailingProvider,
            &test_executor(),
            &mut transcript,
            &mut usage,
            &LoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::Provider { .. }));
        assert_eq!(err.kind(), "provider_error");
    }
}
