//! Configuration
//!
//! TOML-based configuration: provider selection, API keys, model defaults,
//! agent loop settings, and price-table overrides. Validation fails fast;
//! a misconfigured agent never starts a conversation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AgentError;
use crate::retry::RetryPolicy;
use crate::usage::{default_price_for, ModelPrice};

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

/// Top-level agent configuration (maps to TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Active provider name ("openai" or "claude").
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Provider-specific configurations.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentSettings,

    /// Per-model price overrides (USD per 1M tokens).
    #[serde(default)]
    pub prices: HashMap<String, ModelPrice>,
}

fn default_provider() -> String {
    "openai".to_string()
}

/// Per-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub claude: Option<ProviderConfig>,
}

/// Configuration for a single provider backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key. If absent, falls back to the environment variable.
    pub api_key: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Custom base URL (compatible endpoints, test servers).
    pub base_url: Option<String>,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum tool-calling rounds per question before the forced final
    /// answer (default 8).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Per-question deadline in seconds (default 120).
    #[serde(default = "default_timeout_secs")]
    pub answer_timeout_secs: u64,

    /// Whether `reset()` also zeroes the usage counters (default false:
    /// counters are agent-lifetime totals).
    #[serde(default)]
    pub reset_usage_on_reset: bool,

    /// Retry policy settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            answer_timeout_secs: default_timeout_secs(),
            reset_usage_on_reset: false,
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_rounds() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    120
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    1
}
fn default_base_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8000
}
fn default_multiplier() -> f64 {
    2.0
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl AgentConfig {
    /// Load config from the default location:
    /// `~/.config/tabqa/config.toml`. Missing file means defaults.
    pub fn load_default() -> Result<Self, AgentError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            info!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, AgentError> {
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            reason: format!("failed to read config '{}': {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| AgentError::Config {
            reason: format!("failed to parse config '{}': {e}", path.display()),
        })?;
        info!(path = %path.display(), provider = %config.provider, "loaded config");
        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> Result<PathBuf, AgentError> {
        let dir = dirs::config_dir().ok_or_else(|| AgentError::Config {
            reason: "could not determine config directory".into(),
        })?;
        Ok(dir.join("tabqa").join("config.toml"))
    }

    /// Resolve the API key for a provider, checking config then env vars.
    pub fn resolve_api_key(&self, provider_name: &str) -> Option<String> {
        let config_key = match provider_name {
            "openai" => self.providers.openai.as_ref().and_then(|p| p.api_key.clone()),
            "claude" => self.providers.claude.as_ref().and_then(|p| p.api_key.clone()),
            _ => None,
        };
        if config_key.is_some() {
            return config_key;
        }

        let env_var = match provider_name {
            "openai" => "OPENAI_API_KEY",
            "claude" => "ANTHROPIC_API_KEY",
            _ => return None,
        };
        std::env::var(env_var).ok()
    }

    /// The model to use for a provider.
    pub fn model_for_provider(&self, provider_name: &str) -> String {
        let configured = match provider_name {
            "openai" => self.providers.openai.as_ref().and_then(|p| p.model.clone()),
            "claude" => self.providers.claude.as_ref().and_then(|p| p.model.clone()),
            _ => None,
        };
        configured.unwrap_or_else(|| match provider_name {
            "claude" => "claude-sonnet-4-20250514".to_string(),
            _ => "gpt-4o-mini".to_string(),
        })
    }

    /// Base URL override for a provider, if configured.
    pub fn base_url_for_provider(&self, provider_name: &str) -> Option<String> {
        match provider_name {
            "openai" => self.providers.openai.as_ref().and_then(|p| p.base_url.clone()),
            "claude" => self.providers.claude.as_ref().and_then(|p| p.base_url.clone()),
            _ => None,
        }
    }

    /// Price for a model: configured override first, then the built-in table.
    pub fn price_for(&self, model: &str) -> ModelPrice {
        self.prices
            .get(model)
            .copied()
            .unwrap_or_else(|| default_price_for(model))
    }

    /// Validate the config on startup. Fails fast before any conversation.
    pub fn validate(&self) -> Result<(), AgentError> {
        let env_var = match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            "claude" => "ANTHROPIC_API_KEY",
            other => {
                return Err(AgentError::Config {
                    reason: format!("unknown provider '{other}' (expected: openai or claude)"),
                });
            }
        };

        if self.resolve_api_key(&self.provider).is_none() {
            return Err(AgentError::Config {
                reason: format!(
                    "no API key for provider '{}': set {} or add api_key under [providers.{}]",
                    self.provider, env_var, self.provider
                ),
            });
        }

        if self.agent.max_rounds == 0 {
            return Err(AgentError::Config {
                reason: "agent.max_rounds must be at least 1".into(),
            });
        }

        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            providers: ProvidersConfig::default(),
            agent: AgentSettings::default(),
            prices: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config generation (for `config init`)
// ---------------------------------------------------------------------------

/// Generate a sample config TOML string.
pub fn sample_config() -> String {
    r#"# tabqa configuration

# Active LLM provider: "openai" or "claude"
provider = "openai"

[providers.openai]
# api_key = "sk-..."  # Or set OPENAI_API_KEY env var
model = "gpt-4o-mini"
# base_url = "https://api.openai.com"  # For compatible endpoints

[providers.claude]
# api_key = "sk-ant-..."  # Or set ANTHROPIC_API_KEY env var
model = "claude-sonnet-4-20250514"

[agent]
max_rounds = 8
answer_timeout_secs = 120
reset_usage_on_reset = false

[agent.retry]
max_retries = 1
base_delay_ms = 500

# Price overrides, USD per 1M tokens:
# [prices."my-local-model"]
# input_per_mtok = 0.0
# output_per_mtok = 0.0
"#
    .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
