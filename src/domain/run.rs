//! Pipeline run state and staged progress.
//!
//! A PipelineRun records one execution of the detect-then-resolve pipeline
//! over a document's segments. Runs end Succeeded or Failed; there is no
//! cancellation and no automatic retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of background run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Document ingestion: detect mentions, resolve entities
    Ingest,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Ingest => "ingest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingest" => Some(RunKind::Ingest),
            _ => None,
        }
    }
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet executing
    Queued,

    /// Currently executing
    Running,

    /// Completed successfully (terminal)
    Succeeded,

    /// Aborted with an error (terminal)
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Stage reached by an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Segments were handed to the pipeline
    SegmentsReceived,

    /// Mention detection finished
    DetectionComplete,

    /// Entity resolution started
    ResolutionStarted,

    /// All stages finished
    Complete,
}

/// Staged progress snapshot, serialized into the run record as JSON.
///
/// Counts appear as their stage completes and stay present afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Stage reached
    pub stage: Stage,

    /// Number of segments handed to the pipeline
    pub segments: usize,

    /// Mentions detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions: Option<usize>,

    /// Mentions linked to an entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<usize>,

    /// Mentions escalated for review
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,

    /// Mentions left unresolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<usize>,
}

impl ProgressSnapshot {
    pub fn segments_received(segments: usize) -> Self {
        Self {
            stage: Stage::SegmentsReceived,
            segments,
            mentions: None,
            resolved: None,
            candidates: None,
            unresolved: None,
        }
    }

    pub fn detection_complete(segments: usize, mentions: usize) -> Self {
        Self {
            stage: Stage::DetectionComplete,
            segments,
            mentions: Some(mentions),
            resolved: None,
            candidates: None,
            unresolved: None,
        }
    }

    pub fn resolution_started(segments: usize, mentions: usize) -> Self {
        Self {
            stage: Stage::ResolutionStarted,
            segments,
            mentions: Some(mentions),
            resolved: None,
            candidates: None,
            unresolved: None,
        }
    }

    pub fn complete(
        segments: usize,
        mentions: usize,
        resolved: usize,
        candidates: usize,
        unresolved: usize,
    ) -> Self {
        Self {
            stage: Stage::Complete,
            segments,
            mentions: Some(mentions),
            resolved: Some(resolved),
            candidates: Some(candidates),
            unresolved: Some(unresolved),
        }
    }
}

/// One execution of the ingestion pipeline over a document's segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Universe (tenant) the run operates in
    pub universe_id: Uuid,

    /// Document being ingested
    pub document_id: Uuid,

    /// Kind of run
    pub kind: RunKind,

    /// Current status
    pub status: RunStatus,

    /// Staged progress snapshot
    pub progress: ProgressSnapshot,

    /// Error message when the run failed
    pub error: Option<String>,

    /// When the run was created
    pub created_at: DateTime<Utc>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a new ingestion run, already Running
    pub fn ingest(universe_id: Uuid, document_id: Uuid, segments: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            universe_id,
            document_id,
            kind: RunKind::Ingest,
            status: RunStatus::Running,
            progress: ProgressSnapshot::segments_received(segments),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the run Succeeded with its final snapshot
    pub fn succeed(&mut self, snapshot: ProgressSnapshot) {
        self.status = RunStatus::Succeeded;
        self.progress = snapshot;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run Failed with the captured error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut run = PipelineRun::ingest(Uuid::new_v4(), Uuid::new_v4(), 4);
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.is_finished());

        run.succeed(ProgressSnapshot::complete(4, 10, 7, 2, 1));
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.is_finished());
        assert!(run.completed_at.is_some());
        assert_eq!(run.progress.resolved, Some(7));
    }

    #[test]
    fn test_failed_run_records_error() {
        let mut run = PipelineRun::ingest(Uuid::new_v4(), Uuid::new_v4(), 1);
        run.fail("store unavailable");

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("store unavailable"));
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_snapshot_serializes_without_absent_counts() {
        let snapshot = ProgressSnapshot::detection_complete(3, 12);
        let json = serde_json::to_string(&snapshot).unwrap();

        assert!(json.contains("\"mentions\":12"));
        assert!(!json.contains("resolved"));
    }
}
