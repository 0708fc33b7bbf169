//! Core types for plansmith

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable key identifying one generation role and its output section.
///
/// The four Phase 1 keys (`Market`, `Product`, `Finance`, `Gtm`) index the
/// concurrently generated plan sections; `Integration` identifies the Phase 2
/// editor that synthesizes them into the final document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    /// Market analysis section
    Market,
    /// Product strategy section
    Product,
    /// Financial plan section
    Finance,
    /// Go-to-market strategy section
    Gtm,
    /// Phase 2 integration editor
    Integration,
}

impl SectionKey {
    /// All four Phase 1 section keys, in presentation order.
    pub const PHASE1: [SectionKey; 4] = [
        SectionKey::Market,
        SectionKey::Product,
        SectionKey::Finance,
        SectionKey::Gtm,
    ];

    /// String form used in snapshots, events, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Market => "market",
            SectionKey::Product => "product",
            SectionKey::Finance => "finance",
            SectionKey::Gtm => "gtm",
            SectionKey::Integration => "integration",
        }
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input/output token counts reported by the generation service.
///
/// Counts are unsigned by construction, so invalid negative token counts are
/// unrepresentable and cost estimation has no failure mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the request (system instructions + user content)
    pub input: u64,
    /// Tokens produced by the generation
    pub output: u64,
}

impl TokenUsage {
    /// Create a usage record from raw counts.
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Execution state of one agent run.
///
/// State machine: `Idle → Running → Streaming → {Done | Failed}`. `Idle` is
/// the only initial state; `Done` and `Failed` are terminal for one run and
/// reset to `Running` when the agent is invoked again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Constructed, never run (or reset between runs)
    #[default]
    Idle,
    /// Run started: prompt construction and precondition checks
    Running,
    /// First output fragment received, stream in progress
    Streaming,
    /// Stream completed and token usage recorded
    Done,
    /// Run failed with an unrecovered error
    Failed,
}

impl AgentState {
    /// True for `Done` and `Failed`, the two terminal states of one run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Done | AgentState::Failed)
    }
}

/// Read-only copy of one agent's observable state.
///
/// Snapshots are owned copies handed to pollers; they never alias the live
/// agent state, so a poller can never observe a half-updated agent.
#[derive(Clone, Debug, Serialize)]
pub struct AgentSnapshot {
    /// Current state machine position
    pub state: AgentState,
    /// Progress estimate in `[0.0, 1.0]`, monotonically non-decreasing
    /// within one run and exactly `1.0` once the run is terminal
    pub progress: f32,
    /// Human-readable error description, set only when `state` is `Failed`
    pub last_error: Option<String>,
}

/// Immutable input bundle for one generation request.
///
/// Owned by the caller and read-only to all agents. The `sections` map is
/// empty for Phase 1 runs and populated (via [`RequestContext::with_sections`])
/// with the Phase 1 results before the Phase 2 integration run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestContext {
    /// Company or project name the plan is generated for
    pub company_name: String,
    /// Free-form description of the business
    pub business_description: String,
    /// Optional additional context supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Planning horizon in years
    #[serde(default = "default_plan_years")]
    pub plan_years: u32,
    /// Already-produced section outputs, consumed by the Phase 2 editor only
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub sections: HashMap<SectionKey, String>,
}

fn default_plan_years() -> u32 {
    5
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            business_description: String::new(),
            additional_context: None,
            plan_years: default_plan_years(),
            sections: HashMap::new(),
        }
    }
}

impl RequestContext {
    /// Create a context for a new generation request.
    pub fn new(company_name: impl Into<String>, business_description: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            business_description: business_description.into(),
            additional_context: None,
            plan_years: default_plan_years(),
            sections: HashMap::new(),
        }
    }

    /// Return a copy of this context carrying the given section outputs.
    ///
    /// Used by the orchestrator to build the Phase 2 aggregation context from
    /// the settled Phase 1 result map.
    pub fn with_sections(&self, sections: HashMap<SectionKey, String>) -> Self {
        Self {
            sections,
            ..self.clone()
        }
    }
}

/// Final result of one full orchestrator run. Immutable once returned.
#[derive(Clone, Debug, Serialize)]
pub struct PlanReport {
    /// Phase 1 output per section key: generated content, or the role's
    /// fallback text plus error detail for degraded sections
    pub sections: HashMap<SectionKey, String>,
    /// The integrated plan document produced by Phase 2
    pub document: String,
    /// Section keys whose output is fallback text rather than real content
    pub degraded: Vec<SectionKey>,
    /// Total token usage summed over all five agent runs
    pub token_usage: TokenUsage,
    /// Estimated cost in USD for the configured pricing tier
    pub estimated_cost_usd: f64,
    /// Wall-clock duration of the full run in seconds
    pub elapsed_seconds: f64,
    /// Timestamp at which the run completed
    pub completed_at: DateTime<Utc>,
}

/// Event emitted during an orchestrator run.
///
/// Multiple subscribers are supported via a broadcast channel; per-chunk
/// progress is exposed through [`crate::Orchestrator::progress_snapshot`]
/// polling rather than flooding the event stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A pipeline phase began
    PhaseStarted {
        /// Phase number (1 or 2)
        phase: u8,
    },
    /// An agent run started
    AgentStarted {
        /// Section key of the agent
        key: SectionKey,
    },
    /// An agent run completed successfully
    AgentCompleted {
        /// Section key of the agent
        key: SectionKey,
        /// Token usage reported by the service for this run
        usage: TokenUsage,
    },
    /// A Phase 1 agent exhausted its retries and was degraded to fallback text
    AgentDegraded {
        /// Section key of the agent
        key: SectionKey,
        /// Captured error detail
        error: String,
    },
    /// The full run completed and a report was produced
    RunCompleted {
        /// Total token usage over all agents
        usage: TokenUsage,
        /// Estimated cost in USD
        estimated_cost_usd: f64,
        /// Wall-clock duration in seconds
        elapsed_seconds: f64,
    },
    /// The run failed (Phase 2 exhausted retries or the run was cancelled)
    RunFailed {
        /// Human-readable failure description
        error: String,
    },
}
