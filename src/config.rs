//! Configuration types for plansmith

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Claude model used for all agents
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default Anthropic Messages API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Top-level configuration for the generation engine
///
/// Works out of the box: only an API key (here or via the
/// `ANTHROPIC_API_KEY` environment variable) is required.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Model identifier sent with every generation request
    #[serde(default = "default_model")]
    pub model: String,

    /// API key for the generation service. When `None`, the
    /// `ANTHROPIC_API_KEY` environment variable is consulted at run time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the generation service (override for testing/proxies)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Token budget per agent run (default: 5000)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Average characters per output token, used for the streaming progress
    /// estimate (default: 4)
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Pricing rates for cost estimation
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Retry behavior for transient generation failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            api_base_url: default_api_base_url(),
            max_tokens: default_max_tokens(),
            chars_per_token: default_chars_per_token(),
            pricing: PricingConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the API key from the config or the `ANTHROPIC_API_KEY`
    /// environment variable, rejecting empty values.
    ///
    /// This is the credential precondition every agent checks before opening
    /// a network call; failure here is a non-retryable configuration error.
    pub fn resolved_api_key(&self) -> crate::error::Result<String> {
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
        };
        if key.trim().is_empty() {
            return Err(crate::error::Error::missing_api_key());
        }
        Ok(key)
    }
}

/// Per-million-token pricing for the configured model tier
///
/// Defaults match Claude Sonnet 4.5: $3 per million input tokens,
/// $15 per million output tokens.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PricingConfig {
    /// USD per one million input tokens
    #[serde(default = "default_input_per_mtok")]
    pub input_per_mtok: f64,

    /// USD per one million output tokens
    #[serde(default = "default_output_per_mtok")]
    pub output_per_mtok: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_mtok: default_input_per_mtok(),
            output_per_mtok: default_output_per_mtok(),
        }
    }
}

/// Retry configuration for transient generation failures
///
/// The wrapper surrounds a whole agent run. Defaults allow one retry
/// (two attempts total) with a 2 second delay capped at 10 seconds and no
/// exponential growth, matching the conservative budget appropriate for
/// calls that already take seconds to minutes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (default: 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry, in seconds (default: 2)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries, in seconds (default: 10)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_max_tokens() -> u32 {
    5000
}

fn default_chars_per_token() -> u32 {
    4
}

fn default_input_per_mtok() -> f64 {
    3.0
}

fn default_output_per_mtok() -> f64 {
    15.0
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Duration serialization as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
