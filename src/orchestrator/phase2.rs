//! Phase 2: the integration editor merges the Phase 1 sections into one
//! document. Unlike Phase 1, its failure fails the whole run.

use std::collections::HashMap;

use tracing::info;

use crate::error::Result;
use crate::types::{Event, RequestContext, SectionKey};

use super::Orchestrator;
use super::phase1::run_with_retry;

impl Orchestrator {
    /// Runs the integration editor over the Phase 1 section map and returns
    /// the integrated document. The editor receives owned copies of the
    /// section texts; degraded sections flow through like any other input.
    pub(super) async fn run_phase2(
        &self,
        ctx: &RequestContext,
        sections: &HashMap<SectionKey, String>,
    ) -> Result<String> {
        let key = self.editor.key();
        let ctx = ctx.with_sections(sections.clone());

        self.emit(Event::AgentStarted { key });
        let document = run_with_retry(
            &self.editor,
            &ctx,
            &self.progress,
            &self.config.retry,
            key,
        )
        .await?;

        let usage = self.editor.token_usage();
        self.record_usage(usage);
        info!(document_chars = document.len(), "integration completed");
        self.emit(Event::AgentCompleted { key, usage });
        Ok(document)
    }
}
