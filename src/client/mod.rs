//! Generation service client abstraction
//!
//! The engine consumes exactly one external capability: start a streamed
//! generation call, receive text fragments, and receive a final token
//! accounting. [`GenerationBackend`] captures that capability as a trait so
//! the execution machinery is independent of the concrete service;
//! [`anthropic::AnthropicBackend`] is the production implementation.

pub mod anthropic;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::TokenUsage;

/// One streamed generation request.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Role name, used for log correlation only — never sent to the service
    pub role: String,
    /// Model identifier
    pub model: String,
    /// Output token budget for this call
    pub max_tokens: u32,
    /// System instructions
    pub system: String,
    /// User content
    pub user: String,
}

/// One event on a generation stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A fragment of generated text
    Delta(String),
    /// The call completed; carries the service's final token accounting.
    /// Always the last event on a well-formed stream.
    Completed(TokenUsage),
}

/// Stream of generation events, terminated by [`StreamEvent::Completed`]
pub type GenerationStream = BoxStream<'static, Result<StreamEvent>>;

/// Capability to start streamed generation calls.
///
/// Implementations map service-reported failures onto the crate error
/// taxonomy: throttling to [`crate::Error::RateLimited`], credential
/// rejection to [`crate::Error::Authentication`], server failures to
/// [`crate::Error::Service`], connectivity to [`crate::Error::Network`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a streaming generation call.
    ///
    /// Returns once the call is accepted; fragments and the final accounting
    /// arrive on the returned stream.
    async fn stream_generation(&self, request: GenerationRequest) -> Result<GenerationStream>;
}
