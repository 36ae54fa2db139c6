//! Persistence and similarity-index collaborator.
//!
//! The `CanonStore` trait is the single seam between the pipeline core and
//! durable storage. Two implementations ship with the crate:
//! - `MemoryStore`: in-process maps, used by tests and embedding callers
//! - `SqliteStore`: durable single-file store used by the CLI
//!
//! Exact and fuzzy alias lookup are part of this seam because a production
//! deployment serves them from the database (e.g. a trigram index); the
//! portable implementations here score aliases with a pluggable
//! `Similarity` measure instead.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    AmbiguityItem, AmbiguityStatus, Entity, EntityAlias, Mention, PipelineRun, ResolutionStatus,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

/// An entity matched against a surface form, with its match score
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub entity: Entity,
    pub score: f64,
}

/// Storage collaborator for entities, aliases, mentions, review items,
/// and pipeline runs. Every query is scoped to one universe; no
/// cross-tenant reads or matches are possible through this interface.
#[async_trait]
pub trait CanonStore: Send + Sync {
    /// Create an entity together with its primary alias, atomically.
    ///
    /// A stored entity without an alias would be invisible to exact
    /// matching, so the two inserts must succeed or fail as one.
    async fn create_entity(
        &self,
        entity: &Entity,
        primary_alias: &EntityAlias,
    ) -> Result<(), StoreError>;

    /// Attach an additional alias to an existing entity
    async fn add_alias(&self, alias: &EntityAlias) -> Result<(), StoreError>;

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>, StoreError>;

    async fn list_entities(&self, universe_id: Uuid) -> Result<Vec<Entity>, StoreError>;

    /// All entities with an alias whose normalized text equals `normalized`,
    /// each scored 1.0 regardless of the alias's stored confidence.
    async fn find_exact(
        &self,
        normalized: &str,
        universe_id: Uuid,
    ) -> Result<Vec<ScoredCandidate>, StoreError>;

    /// Approximate matches for a surface form.
    ///
    /// Aliases whose raw similarity to the normalized surface form reaches
    /// `min_similarity` yield a candidate scored `similarity × alias
    /// confidence`; one candidate per entity (best score), sorted
    /// descending, truncated to `max_results`.
    async fn find_similar(
        &self,
        surface_form: &str,
        universe_id: Uuid,
        min_similarity: f64,
        max_results: usize,
    ) -> Result<Vec<ScoredCandidate>, StoreError>;

    async fn insert_mentions(&self, mentions: &[Mention]) -> Result<(), StoreError>;

    async fn update_mention(&self, mention: &Mention) -> Result<(), StoreError>;

    async fn get_mention(&self, id: Uuid) -> Result<Option<Mention>, StoreError>;

    async fn mentions_by_status(
        &self,
        universe_id: Uuid,
        status: ResolutionStatus,
    ) -> Result<Vec<Mention>, StoreError>;

    async fn mentions_by_segment(&self, segment_id: Uuid) -> Result<Vec<Mention>, StoreError>;

    async fn mentions_by_entity(&self, entity_id: Uuid) -> Result<Vec<Mention>, StoreError>;

    async fn create_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError>;

    async fn get_ambiguity(&self, id: Uuid) -> Result<Option<AmbiguityItem>, StoreError>;

    async fn update_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError>;

    async fn ambiguities_by_status(
        &self,
        universe_id: Uuid,
        status: AmbiguityStatus,
    ) -> Result<Vec<AmbiguityItem>, StoreError>;

    async fn create_run(&self, run: &PipelineRun) -> Result<(), StoreError>;

    async fn update_run(&self, run: &PipelineRun) -> Result<(), StoreError>;

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError>;
}
