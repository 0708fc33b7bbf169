//! Error types for plansmith
//!
//! Errors are organized by category so the retry layer can distinguish
//! transient service conditions (rate limiting, server failures, connectivity)
//! from permanent ones (missing or rejected credentials). Classification lives
//! on [`crate::retry::IsRetryable`]; this module only defines the taxonomy and
//! the user-facing messages.

use thiserror::Error;

/// Result type alias for plansmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for plansmith
#[derive(Debug, Error)]
pub enum Error {
    /// Local configuration problem detected before any network call
    /// (missing or empty API credential, invalid setting)
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_key")
        key: Option<String>,
    },

    /// The service reported throttling (HTTP 429)
    #[error("rate limited by the generation service{}", retry_after_suffix(.retry_after))]
    RateLimited {
        /// Server-suggested wait before retrying, from the Retry-After header
        retry_after: Option<u64>,
    },

    /// The service rejected the credential at call time (HTTP 401/403).
    /// Distinct from [`Error::Config`], which is detected locally before
    /// any call is made.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The service reported an internal failure (HTTP 5xx)
    #[error("generation service error ({status}): {message}")]
    Service {
        /// HTTP status code reported by the service
        status: u16,
        /// Error message from the service response body
        message: String,
    },

    /// Connectivity or timeout failure reaching the service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The event stream was malformed or ended before completion
    #[error("stream error: {0}")]
    Stream(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled via its cancellation token
    #[error("generation cancelled")]
    Cancelled,

    /// Anything else
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

fn retry_after_suffix(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl Error {
    /// Shorthand for a missing-credential configuration error.
    pub(crate) fn missing_api_key() -> Self {
        Error::Config {
            message: "no API key configured: set `api_key` in the configuration \
                      or export ANTHROPIC_API_KEY"
                .to_string(),
            key: Some("api_key".to_string()),
        }
    }
}
