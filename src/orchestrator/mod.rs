//! Two-phase generation pipeline.
//!
//! Phase 1 runs the four section agents concurrently; a failing section is
//! degraded to fallback text and never stops the run. Phase 2 runs the
//! integration editor sequentially over the Phase 1 results; its failure
//! fails the run.

mod phase1;
mod phase2;


use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::Agent;
use crate::client::GenerationBackend;
use crate::config::Config;
use crate::cost::estimate_cost;
use crate::error::{Error, Result};
use crate::progress::ProgressTable;
use crate::role::{integration_editor, phase1_roles};
use crate::types::{AgentSnapshot, Event, PlanReport, RequestContext, SectionKey, TokenUsage};

/// Capacity of the event broadcast channel. Slow subscribers lag rather
/// than block the pipeline.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Coordinates the five agents through the two-phase pipeline and produces
/// a [`PlanReport`].
pub struct Orchestrator {
    config: Arc<Config>,
    section_agents: Vec<Arc<Agent>>,
    editor: Arc<Agent>,
    progress: Arc<ProgressTable>,
    usage_input: AtomicU64,
    usage_output: AtomicU64,
    events: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator over the given backend.
    pub fn new(config: Config, backend: Arc<dyn GenerationBackend>) -> Self {
        let config = Arc::new(config);
        let cancel_token = CancellationToken::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let section_agents = phase1_roles()
            .into_iter()
            .map(|role| {
                Arc::new(Agent::new(
                    role,
                    config.clone(),
                    backend.clone(),
                    cancel_token.clone(),
                ))
            })
            .collect();
        let editor = Arc::new(Agent::new(
            integration_editor(),
            config.clone(),
            backend,
            cancel_token.clone(),
        ));

        Self {
            config,
            section_agents,
            editor,
            progress: Arc::new(ProgressTable::new()),
            usage_input: AtomicU64::new(0),
            usage_output: AtomicU64::new(0),
            events,
            cancel_token,
        }
    }

    /// Subscribes to pipeline events. May be called any number of times,
    /// before or during a run.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Requests cancellation of the running pipeline. In-flight streams stop
    /// at the next await point and the run fails with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Returns an owned copy of the per-section progress values.
    pub fn progress_snapshot(&self) -> HashMap<SectionKey, f32> {
        self.progress.snapshot()
    }

    /// Returns an owned state snapshot for every agent, keyed by section.
    pub fn agent_snapshots(&self) -> HashMap<SectionKey, AgentSnapshot> {
        let mut snapshots = HashMap::new();
        for agent in &self.section_agents {
            snapshots.insert(agent.key(), agent.snapshot());
        }
        snapshots.insert(self.editor.key(), self.editor.snapshot());
        snapshots
    }

    /// Total token usage accumulated so far in the current run.
    pub fn total_usage(&self) -> TokenUsage {
        TokenUsage::new(
            self.usage_input.load(Ordering::SeqCst),
            self.usage_output.load(Ordering::SeqCst),
        )
    }

    /// Runs the full pipeline: Phase 1 sections concurrently, then the
    /// Phase 2 integration pass.
    ///
    /// Section failures degrade to fallback text and are reported through
    /// the returned [`PlanReport::degraded`] list and [`Event::AgentDegraded`]
    /// events. An integration failure or cancellation fails the whole run.
    pub async fn run_all(&self, ctx: &RequestContext) -> Result<PlanReport> {
        let started = Instant::now();
        self.usage_input.store(0, Ordering::SeqCst);
        self.usage_output.store(0, Ordering::SeqCst);
        self.progress.reset();

        info!(company = %ctx.company_name, "starting plan generation run");

        self.emit(Event::PhaseStarted { phase: 1 });
        let (sections, degraded) = self.run_phase1(ctx).await;

        if self.cancel_token.is_cancelled() {
            return self.fail_run(Error::Cancelled);
        }

        self.emit(Event::PhaseStarted { phase: 2 });
        let document = match self.run_phase2(ctx, &sections).await {
            Ok(document) => document,
            Err(e) => return self.fail_run(e),
        };

        let token_usage = self.total_usage();
        let estimated_cost_usd = estimate_cost(token_usage, &self.config.pricing);
        let elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            input_tokens = token_usage.input,
            output_tokens = token_usage.output,
            cost_usd = estimated_cost_usd,
            elapsed_seconds,
            degraded = degraded.len(),
            "plan generation run completed"
        );
        self.emit(Event::RunCompleted {
            usage: token_usage,
            estimated_cost_usd,
            elapsed_seconds,
        });

        Ok(PlanReport {
            sections,
            document,
            degraded,
            token_usage,
            estimated_cost_usd,
            elapsed_seconds,
            completed_at: Utc::now(),
        })
    }

    fn record_usage(&self, usage: TokenUsage) {
        self.usage_input.fetch_add(usage.input, Ordering::SeqCst);
        self.usage_output.fetch_add(usage.output, Ordering::SeqCst);
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn fail_run(&self, error: Error) -> Result<PlanReport> {
        tracing::error!(error = %error, "plan generation run failed");
        self.emit(Event::RunFailed {
            error: error.to_string(),
        });
        Err(error)
    }
}
