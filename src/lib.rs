//! # plansmith
//!
//! Concurrent multi-agent business plan generation engine with streaming
//! progress.
//!
//! ## Design Philosophy
//!
//! plansmith is designed to be:
//! - **Failure-isolating** - A failing section degrades to fallback text
//!   instead of sinking the whole run
//! - **Streaming-first** - Output arrives as it is generated, with a live
//!   per-section progress estimate
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Pipeline
//!
//! A run has two phases. Phase 1 executes four section agents concurrently
//! (market research, product strategy, financial modeling, go-to-market);
//! Phase 2 hands their outputs to a sequential integration editor that
//! produces the final document. Transient failures are retried once, and
//! token usage is accumulated across all five agents for cost estimation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use plansmith::{AnthropicBackend, Config, Orchestrator, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api_key: Some("sk-ant-...".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let backend = Arc::new(AnthropicBackend::new(Arc::new(config.clone())));
//!     let orchestrator = Orchestrator::new(config, backend);
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let ctx = RequestContext::new("Acme Inc.", "B2B widget subscriptions");
//!     let report = orchestrator.run_all(&ctx).await?;
//!     println!("{}", report.document);
//!     println!("Estimated cost: ${:.2}", report.estimated_cost_usd);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Streamed generation agent with state machine and progress estimation
pub mod agent;
/// Generation backends (Anthropic Messages API, plus the backend trait)
pub mod client;
/// Configuration types
pub mod config;
/// Token-based cost estimation
pub mod cost;
/// Error types
pub mod error;
/// Two-phase orchestration pipeline
pub mod orchestrator;
/// Shared per-section progress table
pub mod progress;
/// Retry logic with exponential backoff
pub mod retry;
/// Agent role definitions and fallback texts
pub mod role;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use agent::Agent;
pub use client::anthropic::AnthropicBackend;
pub use client::{GenerationBackend, GenerationRequest, GenerationStream, StreamEvent};
pub use config::{Config, PricingConfig, RetryConfig};
pub use cost::estimate_cost;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use progress::ProgressTable;
pub use role::Role;
pub use types::{
    AgentSnapshot, AgentState, Event, PlanReport, RequestContext, SectionKey, TokenUsage,
};
