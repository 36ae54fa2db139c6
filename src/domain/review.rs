//! Review records for ambiguous identity matches.
//!
//! When resolution finds several plausible entities for one mention it
//! raises an AmbiguityItem instead of guessing. The item stays Open until
//! a human resolves or dismisses it; both outcomes are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::{Entity, EntityType};

/// Review state of an ambiguity item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityStatus {
    /// Waiting for review
    Open,

    /// A reviewer chose one of the candidates (terminal)
    Resolved,

    /// A reviewer rejected the escalation (terminal)
    Dismissed,
}

impl AmbiguityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbiguityStatus::Open => "open",
            AmbiguityStatus::Resolved => "resolved",
            AmbiguityStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AmbiguityStatus::Open),
            "resolved" => Some(AmbiguityStatus::Resolved),
            "dismissed" => Some(AmbiguityStatus::Dismissed),
            _ => None,
        }
    }

    /// Only Open items may transition
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AmbiguityStatus::Open)
    }
}

/// Severity of a review item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

/// One plausible entity for an ambiguous mention, with its match score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRef {
    pub entity_id: Uuid,
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub score: f64,
}

impl CandidateRef {
    pub fn new(entity: &Entity, score: f64) -> Self {
        Self {
            entity_id: entity.id,
            canonical_name: entity.canonical_name.clone(),
            entity_type: entity.entity_type,
            score,
        }
    }
}

/// A review record raised when multiple entities plausibly match a mention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguityItem {
    /// Unique identifier for this item
    pub id: Uuid,

    /// Universe (tenant) this item belongs to
    pub universe_id: Uuid,

    /// The mention whose identity is in question
    pub mention_id: Uuid,

    /// Surface form of that mention, kept for display
    pub surface_form: String,

    /// Plausible entities, ranked by descending score
    pub candidates: Vec<CandidateRef>,

    /// Review state
    pub status: AmbiguityStatus,

    /// Severity of the conflict
    pub severity: Severity,

    /// When the item was raised
    pub created_at: DateTime<Utc>,

    /// When the item was resolved or dismissed
    pub resolved_at: Option<DateTime<Utc>>,

    /// Reviewer notes recorded at resolution/dismissal
    pub resolution_notes: Option<String>,
}

impl AmbiguityItem {
    /// Raise a new Open identity conflict for a mention
    pub fn identity_conflict(
        universe_id: Uuid,
        mention_id: Uuid,
        surface_form: impl Into<String>,
        candidates: Vec<CandidateRef>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            universe_id,
            mention_id,
            surface_form: surface_form.into(),
            candidates,
            status: AmbiguityStatus::Open,
            severity: Severity::Warn,
            created_at: Utc::now(),
            resolved_at: None,
            resolution_notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_open_warn() {
        let item = AmbiguityItem::identity_conflict(Uuid::new_v4(), Uuid::new_v4(), "Alice", vec![]);
        assert_eq!(item.status, AmbiguityStatus::Open);
        assert_eq!(item.severity, Severity::Warn);
        assert!(item.resolved_at.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!AmbiguityStatus::Open.is_terminal());
        assert!(AmbiguityStatus::Resolved.is_terminal());
        assert!(AmbiguityStatus::Dismissed.is_terminal());
    }
}
