//! Agent execution — one stateful wrapper around a streamed generation call
//!
//! An [`Agent`] binds a [`Role`] to the generation backend and owns the
//! per-run state machine (`Idle → Running → Streaming → {Done | Failed}`),
//! accumulated output, progress estimate, and token accounting. Agents are
//! constructed once per orchestrator and reused across runs; each run resets
//! the per-run state.


use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::{GenerationBackend, GenerationRequest, StreamEvent};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::role::Role;
use crate::types::{AgentSnapshot, AgentState, RequestContext, SectionKey, TokenUsage};

/// Progress is capped below 1.0 until the service signals completion; the
/// character-count heuristic must never report a run as finished early.
const PROGRESS_CEILING: f32 = 0.99;

/// One stateful generation unit.
///
/// All mutable state sits behind a mutex so a run on one task can proceed
/// while pollers take [`Agent::snapshot`] copies from another. The lock is
/// never held across an await point or a progress callback.
pub struct Agent {
    role: Role,
    config: Arc<Config>,
    backend: Arc<dyn GenerationBackend>,
    cancel_token: CancellationToken,
    inner: Mutex<AgentInner>,
}

#[derive(Default)]
struct AgentInner {
    state: AgentState,
    progress: f32,
    output: String,
    token_usage: TokenUsage,
    last_error: Option<String>,
}

impl Agent {
    /// Create an agent for the given role.
    pub fn new(
        role: Role,
        config: Arc<Config>,
        backend: Arc<dyn GenerationBackend>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            role,
            config,
            backend,
            cancel_token,
            inner: Mutex::new(AgentInner::default()),
        }
    }

    /// The agent's stable display name.
    pub fn name(&self) -> &'static str {
        self.role.name
    }

    /// The section key this agent produces.
    pub fn key(&self) -> SectionKey {
        self.role.key
    }

    /// Owned copy of the agent's observable state.
    pub fn snapshot(&self) -> AgentSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        AgentSnapshot {
            state: inner.state,
            progress: inner.progress,
            last_error: inner.last_error.clone(),
        }
    }

    /// Token usage recorded by the most recent successful run.
    pub fn token_usage(&self) -> TokenUsage {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).token_usage
    }

    /// Run one streamed generation call to completion.
    ///
    /// Resets the per-run state, checks the credential precondition (a
    /// missing key fails immediately without any network call), then streams
    /// the generation: every fragment is appended to the output, the progress
    /// estimate is recomputed (capped at 0.99 until completion), and
    /// `on_progress(name, progress, fragment)` is invoked synchronously.
    ///
    /// On success the service's final token accounting is recorded exactly
    /// once, progress is forced to 1.0, and the full output is returned. On
    /// any error the agent transitions to `Failed` (progress 1.0, `last_error`
    /// populated) and the error is re-raised to the caller — failures are
    /// never swallowed at this layer.
    pub async fn run<F>(&self, ctx: &RequestContext, on_progress: F) -> Result<String>
    where
        F: Fn(&str, f32, &str),
    {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.state = AgentState::Running;
            inner.progress = 0.0;
            inner.output.clear();
            inner.token_usage = TokenUsage::default();
            inner.last_error = None;
        }

        tracing::info!(role = self.role.name, "Agent run started");

        let result = self.run_stream(ctx, &on_progress).await;

        match &result {
            Ok(output) => {
                tracing::info!(
                    role = self.role.name,
                    output_chars = output.len(),
                    "Agent run completed"
                );
            }
            Err(e) => {
                let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
                inner.state = AgentState::Failed;
                inner.progress = 1.0;
                inner.last_error = Some(e.to_string());
                tracing::error!(role = self.role.name, error = %e, "Agent run failed");
            }
        }

        result
    }

    async fn run_stream<F>(&self, ctx: &RequestContext, on_progress: &F) -> Result<String>
    where
        F: Fn(&str, f32, &str),
    {
        // Credential precondition: fail locally before any network call
        self.config.resolved_api_key()?;

        let request = GenerationRequest {
            role: self.role.name.to_string(),
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: (self.role.instructions)(ctx),
            user: (self.role.content)(ctx),
        };

        let mut stream = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
            stream = self.backend.stream_generation(request) => stream?,
        };

        let budget_chars =
            (self.config.max_tokens as f32 * self.config.chars_per_token as f32).max(1.0);
        let mut received_chars = 0usize;

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
                event = stream.next() => event,
            };

            match event {
                Some(Ok(StreamEvent::Delta(fragment))) => {
                    received_chars += fragment.len();
                    let progress = {
                        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                        inner.state = AgentState::Streaming;
                        inner.output.push_str(&fragment);
                        // Heuristic estimate from characters received against
                        // the token budget; monotonic and capped below 1.0
                        let estimate =
                            (received_chars as f32 / budget_chars).min(PROGRESS_CEILING);
                        inner.progress = inner.progress.max(estimate);
                        inner.progress
                    };
                    // Lock released before the callback: it may poll snapshots
                    on_progress(self.role.name, progress, &fragment);
                }
                Some(Ok(StreamEvent::Completed(usage))) => {
                    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                    inner.token_usage = usage;
                    inner.progress = 1.0;
                    inner.state = AgentState::Done;
                    return Ok(inner.output.clone());
                }
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(Error::Stream(
                        "generation stream ended before completion".to_string(),
                    ));
                }
            }
        }
    }
}
