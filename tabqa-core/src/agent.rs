//! Agent Facade
//!
//! `AgentBuilder` wires the provider, file binding, and configuration into
//! an `Agent` that owns its conversation state and usage counters. The
//! caller owns the agent's lifecycle (construct once and reuse, or build
//! per request); there is no global state anywhere.
//!
//! An agent serves one conversation at a time; `ask` takes `&mut self`, so
//! exclusivity is enforced by the borrow checker rather than a lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::agent_loop::{run_loop, LoopConfig};
use crate::binding::FileBinding;
use crate::config::{AgentConfig, AgentSettings};
use crate::error::AgentError;
use crate::executor::ToolExecutor;
use crate::preamble::PreambleBuilder;
use crate::provider::LlmProvider;
use crate::transcript::Transcript;
use crate::usage::{UsageSnapshot, UsageTracker};

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// The result of one answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Natural-language answer text. Never empty.
    pub text: String,
    /// Agent-lifetime usage totals after this question.
    pub usage: UsageSnapshot,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Typed builder for constructing an [`Agent`].
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    files: Vec<PathBuf>,
    preamble: PreambleBuilder,
    config: AgentConfig,
}

impl AgentBuilder {
    /// Create a builder with the given base configuration.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            provider: None,
            files: Vec::new(),
            preamble: PreambleBuilder::new(),
            config,
        }
    }

    /// Set the model provider. Required.
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Bind the data files the agent may read.
    pub fn with_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Override the system preamble template.
    pub fn with_preamble_template(mut self, template: &str) -> Self {
        self.preamble = PreambleBuilder::with_template(template);
        self
    }

    /// Validate required slots and construct the agent.
    pub fn build(self) -> Result<Agent, AgentError> {
        let provider = self.provider.ok_or_else(|| AgentError::Config {
            reason: "an LLM provider is required".into(),
        })?;

        let price = self.config.price_for(provider.model());
        let binding = Arc::new(FileBinding::from_paths(self.files));
        info!(
            provider = provider.name(),
            model = provider.model(),
            files = binding.len(),
            "agent constructed"
        );

        Ok(Agent {
            provider,
            binding,
            pending_binding: None,
            preamble: self.preamble,
            transcript: Transcript::new(),
            usage: UsageTracker::new(price),
            settings: self.config.agent,
        })
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A question-answering agent over a bound set of data files.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    /// Binding for the current conversation. Stable while seeded.
    binding: Arc<FileBinding>,
    /// Replacement binding staged by `set_available_files` mid-conversation;
    /// swapped in at the next `reset`.
    pending_binding: Option<Arc<FileBinding>>,
    preamble: PreambleBuilder,
    transcript: Transcript,
    usage: UsageTracker,
    settings: AgentSettings,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("binding", &self.binding)
            .field("pending_binding", &self.pending_binding)
            .field("preamble", &self.preamble)
            .field("transcript", &self.transcript)
            .field("usage", &self.usage)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Ask a question and drive the tool-calling conversation to an answer.
    ///
    /// The first question seeds the transcript with the system preamble
    /// (embedding the bound file list); follow-up questions extend the same
    /// conversation until [`reset`](Self::reset).
    pub async fn ask(&mut self, question: &str) -> Result<Answer, AgentError> {
        if !self.transcript.is_seeded() {
            let preamble = self.preamble.build(&self.binding.ids());
            self.transcript.seed(&preamble, question);
        } else {
            self.transcript.push_user(question);
        }

        let executor = ToolExecutor::new(self.binding.clone());
        let loop_config = LoopConfig {
            max_rounds: self.settings.max_rounds,
            retry: (&self.settings.retry).into(),
        };

        let seconds = self.settings.answer_timeout_secs;
        let outcome = tokio::time::timeout(
            Duration::from_secs(seconds),
            run_loop(
                self.provider.as_ref(),
                &executor,
                &mut self.transcript,
                &mut self.usage,
                &loop_config,
            ),
        )
        .await
        .map_err(|_| AgentError::Timeout { seconds })??;

        Ok(Answer {
            text: outcome.answer,
            usage: self.usage.snapshot(),
        })
    }

    /// Clear the conversation transcript and apply any staged file binding.
    ///
    /// Usage counters are agent-lifetime totals and survive the reset unless
    /// `agent.reset_usage_on_reset` was configured.
    pub fn reset(&mut self) {
        self.transcript.clear();
        if let Some(binding) = self.pending_binding.take() {
            self.binding = binding;
        }
        if self.settings.reset_usage_on_reset {
            self.usage.reset();
        }
        info!("conversation reset");
    }

    /// Replace the bound file set.
    ///
    /// Takes effect immediately when no conversation is seeded; otherwise it
    /// is staged and applied by the next `reset`, so an in-flight
    /// conversation never observes the change.
    pub fn set_available_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let binding = Arc::new(FileBinding::from_paths(paths));
        if self.transcript.is_seeded() {
            self.pending_binding = Some(binding);
        } else {
            self.binding = binding;
        }
    }

    /// Identifiers of the files bound to the current conversation.
    pub fn available_files(&self) -> Vec<String> {
        self.binding.ids()
    }

    /// Current usage totals.
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Read access to the transcript (structural assertions, display).
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
