//! Canonical entities and their aliases.
//!
//! An Entity is a node in the canon knowledge graph. Every entity carries
//! at least one alias whose normalized text equals its normalized
//! canonical name; that primary alias is created atomically with the
//! entity so the entity is always reachable through exact matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of canonical entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A character
    Person,

    /// A location
    Place,

    /// An organization, faction, or institution
    Org,

    /// A physical object or artifact
    Object,

    /// An abstract concept
    Concept,

    /// An event-like entity (battles, festivals, eras)
    EventLike,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Place => "place",
            EntityType::Org => "org",
            EntityType::Object => "object",
            EntityType::Concept => "concept",
            EntityType::EventLike => "event_like",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "person" => Some(EntityType::Person),
            "place" => Some(EntityType::Place),
            "org" => Some(EntityType::Org),
            "object" => Some(EntityType::Object),
            "concept" => Some(EntityType::Concept),
            "event_like" => Some(EntityType::EventLike),
            _ => None,
        }
    }
}

/// A canonical node in the knowledge graph, scoped to one universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity
    pub id: Uuid,

    /// Universe (tenant) this entity belongs to
    pub universe_id: Uuid,

    /// Inferred or author-assigned kind
    pub entity_type: EntityType,

    /// Canonical display name
    pub canonical_name: String,

    /// When the entity was created
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity with a fresh id
    pub fn new(universe_id: Uuid, entity_type: EntityType, canonical_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            universe_id,
            entity_type,
            canonical_name: canonical_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// An alternate surface string mapping to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAlias {
    /// Unique identifier for this alias
    pub id: Uuid,

    /// Entity this alias points to
    pub entity_id: Uuid,

    /// Display form as it appeared in text
    pub display: String,

    /// Normalized form used for matching
    pub normalized: String,

    /// How strongly this alias indicates the entity, in [0, 1]
    pub confidence: f64,

    /// When the alias was created
    pub created_at: DateTime<Utc>,
}

impl EntityAlias {
    /// Create an alias with an explicit confidence
    pub fn new(entity_id: Uuid, display: impl Into<String>, confidence: f64) -> Self {
        let display = display.into();
        let normalized = normalize(&display);
        Self {
            id: Uuid::new_v4(),
            entity_id,
            display,
            normalized,
            confidence,
            created_at: Utc::now(),
        }
    }

    /// The primary alias created together with a new entity (confidence 1.0)
    pub fn primary(entity_id: Uuid, canonical_name: &str) -> Self {
        Self::new(entity_id, canonical_name, 1.0)
    }
}

/// Normalize text for alias matching: trim + case-fold
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
