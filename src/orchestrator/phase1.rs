//! Phase 1: the four section agents run concurrently with failure isolation.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::Result;
use crate::progress::ProgressTable;
use crate::retry::with_retry;
use crate::role::fallback_section;
use crate::types::{Event, RequestContext, SectionKey};

use super::Orchestrator;

impl Orchestrator {
    /// Runs all Phase 1 agents and returns the section map plus the keys
    /// that were degraded to fallback text.
    ///
    /// The returned map always contains an entry for every Phase 1 section;
    /// an agent that exhausts its retries contributes its role's fallback
    /// text with the error detail appended.
    pub(super) async fn run_phase1(
        &self,
        ctx: &RequestContext,
    ) -> (HashMap<SectionKey, String>, Vec<SectionKey>) {
        let mut handles = Vec::with_capacity(self.section_agents.len());
        for agent in &self.section_agents {
            let agent = agent.clone();
            let ctx = ctx.clone();
            let progress = self.progress.clone();
            let retry = self.config.retry.clone();
            let events = self.events.clone();
            let key = agent.key();

            handles.push(tokio::spawn(async move {
                let _ = events.send(Event::AgentStarted { key });
                let result = run_with_retry(&agent, &ctx, &progress, &retry, key).await;
                (key, result)
            }));
        }

        let mut sections = HashMap::new();
        let mut degraded = Vec::new();
        for (agent, joined) in self.section_agents.iter().zip(join_all(handles).await) {
            let (key, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    // A panicking agent task is isolated like any other failure
                    (agent.key(), Err(crate::error::Error::Unexpected(format!(
                        "section task panicked: {e}"
                    ))))
                }
            };

            match result {
                Ok(content) => {
                    let usage = agent.token_usage();
                    self.record_usage(usage);
                    info!(section = %key, output_chars = content.len(), "section completed");
                    self.emit(Event::AgentCompleted { key, usage });
                    sections.insert(key, content);
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(section = %key, error = %error, "section degraded to fallback text");
                    // Settles the slot on the panicked-task path as well,
                    // where the in-task completion never ran
                    self.progress.complete(key);
                    self.emit(Event::AgentDegraded {
                        key,
                        error: error.clone(),
                    });
                    sections.insert(
                        key,
                        format!("{}\n\n**Error detail**: {error}", fallback_section(key)),
                    );
                    degraded.push(key);
                }
            }
        }

        (sections, degraded)
    }
}

/// Runs one agent under the retry policy, wiring its stream callback into
/// the shared progress table. Each attempt owns fresh clones so a retried
/// run never observes state from the previous attempt's callback.
///
/// The slot is forced to 1.0 once the agent settles, success or failure, so
/// the progress table always agrees with the agent's terminal snapshot.
pub(super) async fn run_with_retry(
    agent: &Arc<crate::agent::Agent>,
    ctx: &RequestContext,
    progress: &Arc<ProgressTable>,
    retry: &crate::config::RetryConfig,
    key: SectionKey,
) -> Result<String> {
    let result = with_retry(retry, || {
        let agent = agent.clone();
        let ctx = ctx.clone();
        let progress = progress.clone();
        async move {
            agent
                .run(&ctx, move |_, value, _| progress.update(key, value))
                .await
        }
    })
    .await;
    progress.complete(key);
    result
}
