//! Ingestion runs: detect mentions, resolve entities, record progress.
//!
//! The orchestrator drives one document through the detect-then-resolve
//! pipeline and owns the PipelineRun record for its lifetime. It is the
//! single place where an error from a pipeline stage turns into a
//! terminal Failed run instead of propagating: partial progress made
//! before the failure (entities, aliases, mentions) is kept, and
//! re-ingestion is left to the caller.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{PipelineRun, ProgressSnapshot, ResolutionStatus, Segment};
use crate::store::{CanonStore, StoreError};

use super::detector::MentionDetector;
use super::resolver::EntityResolver;

/// Drives full document ingestion runs
pub struct IngestOrchestrator {
    store: Arc<dyn CanonStore>,
    detector: MentionDetector,
    resolver: EntityResolver,
}

impl IngestOrchestrator {
    pub fn new(store: Arc<dyn CanonStore>) -> Self {
        Self {
            detector: MentionDetector::new(),
            resolver: EntityResolver::new(store.clone()),
            store,
        }
    }

    /// Ingest one document's segments, returning the run id.
    ///
    /// The run ends Succeeded or Failed; either way the id is returned and
    /// the outcome is read back through the store. Only a failure to
    /// create the run record itself propagates as an error.
    #[instrument(skip(self, segments), fields(universe = %universe_id, document = %document_id))]
    pub async fn ingest(
        &self,
        universe_id: Uuid,
        document_id: Uuid,
        segments: &[Segment],
    ) -> Result<Uuid> {
        let mut run = PipelineRun::ingest(universe_id, document_id, segments.len());
        self.store
            .create_run(&run)
            .await
            .context("Failed to create pipeline run")?;
        info!(run_id = %run.id, segments = segments.len(), "Starting ingestion run");

        match self.execute(&mut run, universe_id, segments).await {
            Ok(snapshot) => {
                run.succeed(snapshot);
                info!(
                    run_id = %run.id,
                    resolved = run.progress.resolved,
                    candidates = run.progress.candidates,
                    unresolved = run.progress.unresolved,
                    "Ingestion run succeeded"
                );
            }
            Err(e) => {
                error!(run_id = %run.id, error = %e, "Ingestion run failed");
                run.fail(e.to_string());
            }
        }

        self.store
            .update_run(&run)
            .await
            .context("Failed to record run outcome")?;
        Ok(run.id)
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        universe_id: Uuid,
        segments: &[Segment],
    ) -> Result<ProgressSnapshot, StoreError> {
        let mut mentions = self.detector.detect_batch(segments, universe_id);
        info!(run_id = %run.id, mentions = mentions.len(), "Detection complete");

        run.progress = ProgressSnapshot::detection_complete(segments.len(), mentions.len());
        self.store.update_run(run).await?;
        self.store.insert_mentions(&mentions).await?;

        run.progress = ProgressSnapshot::resolution_started(segments.len(), mentions.len());
        self.store.update_run(run).await?;

        self.resolver.resolve_batch(&mut mentions).await?;

        let resolved = count(&mentions, ResolutionStatus::Resolved);
        let candidates = count(&mentions, ResolutionStatus::Candidate);
        let unresolved = count(&mentions, ResolutionStatus::Unresolved);

        Ok(ProgressSnapshot::complete(
            segments.len(),
            mentions.len(),
            resolved,
            candidates,
            unresolved,
        ))
    }
}

fn count(mentions: &[crate::domain::Mention], status: ResolutionStatus) -> usize {
    mentions.iter().filter(|m| m.status == status).count()
}
