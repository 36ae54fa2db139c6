//! Threshold-driven resolution of mentions against the entity index.
//!
//! For each mention the resolver queries exact matches first, falls back
//! to fuzzy matches, and then walks a fixed decision table: mint a new
//! entity, link a confident match, escalate an ambiguous one, or leave
//! the mention unresolved. Every branch is an explicit `Decision` case so
//! the table stays auditable.
//!
//! Batches resolve strictly sequentially: each mention's side effects are
//! persisted before the next mention is looked up, so repeated surface
//! forms inside one batch collapse onto a single minted entity. A
//! per-universe lock extends the same guarantee to concurrent callers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    normalize, AmbiguityItem, CandidateRef, Entity, EntityAlias, EntityType, Mention,
    ResolutionStatus,
};
use crate::store::{CanonStore, ScoredCandidate, StoreError};

/// Candidates below this score are never considered
pub const AMBIGUITY_THRESHOLD: f64 = 0.75;

/// A single candidate at or above this score is linked outright
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Upper bound on candidates carried into an escalation
pub const MAX_CANDIDATES: usize = 5;

/// Outcome of resolving one mention
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No match existed; a new entity and primary alias were minted
    Minted { entity_id: Uuid },

    /// A single candidate scored at or above the high-confidence threshold
    Linked { entity_id: Uuid, score: f64 },

    /// A single candidate landed between the thresholds; linked with
    /// the mention confidence clamped to the candidate score
    LinkedWeak { entity_id: Uuid, score: f64 },

    /// Several plausible candidates; escalated for human review
    Escalated { item_id: Uuid, candidates: usize },

    /// Nothing reached the ambiguity threshold
    Unresolved,
}

/// Resolves mentions against the tenant-scoped entity index
pub struct EntityResolver {
    store: Arc<dyn CanonStore>,
    universe_locks: StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn CanonStore>) -> Self {
        Self {
            store,
            universe_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Resolve one mention, persisting the updated mention and any side
    /// effects (new entity/alias, escalation record).
    pub async fn resolve(&self, mention: &mut Mention) -> Result<Decision, StoreError> {
        let lock = self.universe_lock(mention.universe_id)?;
        let _guard = lock.lock().await;
        self.resolve_locked(mention).await
    }

    /// Resolve a batch strictly sequentially, in input order.
    ///
    /// Each mention's side effects land in the store before the next
    /// lookup runs; two mentions sharing a normalized surface form mint
    /// exactly one entity between them.
    pub async fn resolve_batch(
        &self,
        mentions: &mut [Mention],
    ) -> Result<Vec<Decision>, StoreError> {
        let mut decisions = Vec::with_capacity(mentions.len());
        for mention in mentions.iter_mut() {
            decisions.push(self.resolve(mention).await?);
        }
        Ok(decisions)
    }

    async fn resolve_locked(&self, mention: &mut Mention) -> Result<Decision, StoreError> {
        let candidates = self
            .find_candidates(mention.universe_id, &mention.surface_form)
            .await?;

        let decision = if candidates.is_empty() {
            let entity_id = self.mint_entity(mention).await?;
            mention.link(entity_id);
            Decision::Minted { entity_id }
        } else if candidates.len() == 1 && candidates[0].score >= HIGH_CONFIDENCE_THRESHOLD {
            let entity_id = candidates[0].entity.id;
            mention.link(entity_id);
            Decision::Linked {
                entity_id,
                score: candidates[0].score,
            }
        } else {
            let mut ranked: Vec<&ScoredCandidate> = candidates
                .iter()
                .filter(|c| c.score >= AMBIGUITY_THRESHOLD)
                .collect();
            ranked.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            ranked.truncate(MAX_CANDIDATES);

            if ranked.len() > 1 {
                let item = AmbiguityItem::identity_conflict(
                    mention.universe_id,
                    mention.id,
                    &mention.surface_form,
                    ranked
                        .iter()
                        .map(|c| CandidateRef::new(&c.entity, c.score))
                        .collect(),
                );
                self.store.create_ambiguity(&item).await?;
                mention.escalate();
                info!(
                    mention = %mention.id,
                    item = %item.id,
                    candidates = ranked.len(),
                    "Escalated ambiguous mention for review"
                );
                Decision::Escalated {
                    item_id: item.id,
                    candidates: ranked.len(),
                }
            } else if let Some(single) = ranked.first() {
                let entity_id = single.entity.id;
                mention.link(entity_id);
                mention.confidence = mention.confidence.min(single.score);
                Decision::LinkedWeak {
                    entity_id,
                    score: single.score,
                }
            } else {
                mention.entity_id = None;
                mention.status = ResolutionStatus::Unresolved;
                Decision::Unresolved
            }
        };

        self.store.update_mention(mention).await?;
        debug!(mention = %mention.id, ?decision, "Resolved mention");
        Ok(decision)
    }

    /// Exact matches on the normalized surface form, else fuzzy matches
    /// at the ambiguity threshold.
    async fn find_candidates(
        &self,
        universe_id: Uuid,
        surface_form: &str,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let normalized = normalize(surface_form);
        let exact = self.store.find_exact(&normalized, universe_id).await?;
        if !exact.is_empty() {
            return Ok(exact);
        }
        self.store
            .find_similar(surface_form, universe_id, AMBIGUITY_THRESHOLD, MAX_CANDIDATES)
            .await
    }

    /// Mint a new entity for an unmatched mention, atomically with its
    /// primary alias.
    async fn mint_entity(&self, mention: &Mention) -> Result<Uuid, StoreError> {
        let entity = Entity::new(
            mention.universe_id,
            infer_entity_type(&mention.surface_form),
            mention.surface_form.clone(),
        );
        let alias = EntityAlias::primary(entity.id, &entity.canonical_name);
        self.store.create_entity(&entity, &alias).await?;
        info!(
            entity = %entity.id,
            name = %entity.canonical_name,
            entity_type = entity.entity_type.as_str(),
            "Minted new entity"
        );
        Ok(entity.id)
    }

    fn universe_lock(&self, universe_id: Uuid) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self
            .universe_locks
            .lock()
            .map_err(|_| StoreError::Internal("universe lock table poisoned".into()))?;
        Ok(locks
            .entry(universe_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }
}

/// Coarse surface-form heuristic for the type of a freshly minted entity.
/// Deliberately kept as-is; downstream review content depends on its
/// exact behavior.
fn infer_entity_type(surface_form: &str) -> EntityType {
    const CORPORATE_SUFFIXES: &[&str] = &["Corp", "Inc", "LLC", "Ltd"];
    if CORPORATE_SUFFIXES.iter().any(|s| surface_form.contains(s)) {
        return EntityType::Org;
    }

    if surface_form
        .chars()
        .all(|c| c.is_uppercase() || c.is_whitespace())
    {
        return EntityType::Org;
    }

    if surface_form.starts_with("The ") && surface_form.split(' ').count() >= 2 {
        return EntityType::Place;
    }

    EntityType::Person
}
