//! Entity mentions detected in segment text.
//!
//! A mention starts Unresolved with no entity link. The resolver either
//! links it (Resolved), escalates it for review (Candidate), or leaves it
//! Unresolved. Invariant: `entity_id.is_some()` exactly when the status
//! is Resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolution state of a mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// No decision yet, or no candidate reached the threshold
    Unresolved,

    /// Escalated for human review
    Candidate,

    /// Linked to an entity
    Resolved,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Unresolved => "unresolved",
            ResolutionStatus::Candidate => "candidate",
            ResolutionStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(ResolutionStatus::Unresolved),
            "candidate" => Some(ResolutionStatus::Candidate),
            "resolved" => Some(ResolutionStatus::Resolved),
            _ => None,
        }
    }
}

/// A detected in-text occurrence of a possible entity reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// Unique identifier for this mention
    pub id: Uuid,

    /// Universe (tenant) this mention belongs to
    pub universe_id: Uuid,

    /// Segment the mention was detected in
    pub segment_id: Uuid,

    /// Linked entity; present exactly when status is Resolved
    pub entity_id: Option<Uuid>,

    /// Text exactly as it appeared
    pub surface_form: String,

    /// Start byte offset within the segment text (inclusive)
    pub span_start: usize,

    /// End byte offset within the segment text (exclusive)
    pub span_end: usize,

    /// Detection/resolution confidence in [0, 1]
    pub confidence: f64,

    /// Current resolution state
    pub status: ResolutionStatus,

    /// When the mention was detected
    pub created_at: DateTime<Utc>,
}

impl Mention {
    /// Create a freshly detected, unresolved mention
    pub fn detected(
        universe_id: Uuid,
        segment_id: Uuid,
        surface_form: impl Into<String>,
        span_start: usize,
        span_end: usize,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            universe_id,
            segment_id,
            entity_id: None,
            surface_form: surface_form.into(),
            span_start,
            span_end,
            confidence,
            status: ResolutionStatus::Unresolved,
            created_at: Utc::now(),
        }
    }

    /// Link this mention to an entity, marking it Resolved
    pub fn link(&mut self, entity_id: Uuid) {
        self.entity_id = Some(entity_id);
        self.status = ResolutionStatus::Resolved;
    }

    /// Mark this mention as escalated for review
    pub fn escalate(&mut self) {
        self.entity_id = None;
        self.status = ResolutionStatus::Candidate;
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_mention_starts_unresolved() {
        let m = Mention::detected(Uuid::new_v4(), Uuid::new_v4(), "Alice", 7, 12, 0.7);
        assert_eq!(m.status, ResolutionStatus::Unresolved);
        assert!(m.entity_id.is_none());
    }

    #[test]
    fn test_link_upholds_invariant() {
        let mut m = Mention::detected(Uuid::new_v4(), Uuid::new_v4(), "Alice", 7, 12, 0.7);
        let entity_id = Uuid::new_v4();
        m.link(entity_id);

        assert_eq!(m.status, ResolutionStatus::Resolved);
        assert_eq!(m.entity_id, Some(entity_id));
    }
}
