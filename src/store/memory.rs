//! In-memory store for tests and embedded callers.
//!
//! State lives in plain maps behind one async RwLock, which also makes
//! entity-plus-alias creation trivially atomic: both inserts happen under
//! a single write guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    normalize, AmbiguityItem, AmbiguityStatus, Entity, EntityAlias, Mention, PipelineRun,
    ResolutionStatus,
};
use crate::similarity::{NormalizedLevenshtein, Similarity};

use super::{CanonStore, ScoredCandidate, StoreError};

#[derive(Default)]
struct Inner {
    entities: HashMap<Uuid, Entity>,
    aliases: HashMap<Uuid, EntityAlias>,
    mentions: HashMap<Uuid, Mention>,
    ambiguities: HashMap<Uuid, AmbiguityItem>,
    runs: HashMap<Uuid, PipelineRun>,
}

/// Map-backed `CanonStore` implementation
pub struct MemoryStore {
    inner: RwLock<Inner>,
    similarity: Arc<dyn Similarity>,
}

impl MemoryStore {
    /// Create a store using the default normalized-Levenshtein scorer
    pub fn new() -> Self {
        Self::with_similarity(Arc::new(NormalizedLevenshtein))
    }

    /// Create a store with a custom similarity scorer
    pub fn with_similarity(similarity: Arc<dyn Similarity>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            similarity,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CanonStore for MemoryStore {
    async fn create_entity(
        &self,
        entity: &Entity,
        primary_alias: &EntityAlias,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.entities.insert(entity.id, entity.clone());
        inner
            .aliases
            .insert(primary_alias.id, primary_alias.clone());
        Ok(())
    }

    async fn add_alias(&self, alias: &EntityAlias) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.entities.contains_key(&alias.entity_id) {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: alias.entity_id,
            });
        }
        inner.aliases.insert(alias.id, alias.clone());
        Ok(())
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>, StoreError> {
        Ok(self.inner.read().await.entities.get(&id).cloned())
    }

    async fn list_entities(&self, universe_id: Uuid) -> Result<Vec<Entity>, StoreError> {
        let inner = self.inner.read().await;
        let mut entities: Vec<Entity> = inner
            .entities
            .values()
            .filter(|e| e.universe_id == universe_id)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entities)
    }

    async fn find_exact(
        &self,
        normalized: &str,
        universe_id: Uuid,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let inner = self.inner.read().await;
        let mut seen: HashMap<Uuid, Entity> = HashMap::new();

        for alias in inner.aliases.values() {
            if alias.normalized != normalized {
                continue;
            }
            let Some(entity) = inner.entities.get(&alias.entity_id) else {
                continue;
            };
            if entity.universe_id != universe_id {
                continue;
            }
            seen.entry(entity.id).or_insert_with(|| entity.clone());
        }

        let mut candidates: Vec<ScoredCandidate> = seen
            .into_values()
            .map(|entity| ScoredCandidate { entity, score: 1.0 })
            .collect();
        candidates.sort_by(|a, b| a.entity.canonical_name.cmp(&b.entity.canonical_name));
        Ok(candidates)
    }

    async fn find_similar(
        &self,
        surface_form: &str,
        universe_id: Uuid,
        min_similarity: f64,
        max_results: usize,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let needle = normalize(surface_form);
        let inner = self.inner.read().await;

        // best score per entity, so several aliases of one entity cannot
        // masquerade as independent candidates
        let mut best: HashMap<Uuid, f64> = HashMap::new();

        for alias in inner.aliases.values() {
            let Some(entity) = inner.entities.get(&alias.entity_id) else {
                continue;
            };
            if entity.universe_id != universe_id {
                continue;
            }
            let similarity = self.similarity.score(&needle, &alias.normalized);
            if similarity < min_similarity {
                continue;
            }
            let score = similarity * alias.confidence;
            let slot = best.entry(entity.id).or_insert(score);
            if score > *slot {
                *slot = score;
            }
        }

        let mut candidates: Vec<ScoredCandidate> = best
            .into_iter()
            .filter_map(|(entity_id, score)| {
                inner.entities.get(&entity_id).map(|entity| ScoredCandidate {
                    entity: entity.clone(),
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.canonical_name.cmp(&b.entity.canonical_name))
        });
        candidates.truncate(max_results);
        Ok(candidates)
    }

    async fn insert_mentions(&self, mentions: &[Mention]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for mention in mentions {
            inner.mentions.insert(mention.id, mention.clone());
        }
        Ok(())
    }

    async fn update_mention(&self, mention: &Mention) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.mentions.contains_key(&mention.id) {
            return Err(StoreError::NotFound {
                kind: "mention",
                id: mention.id,
            });
        }
        inner.mentions.insert(mention.id, mention.clone());
        Ok(())
    }

    async fn get_mention(&self, id: Uuid) -> Result<Option<Mention>, StoreError> {
        Ok(self.inner.read().await.mentions.get(&id).cloned())
    }

    async fn mentions_by_status(
        &self,
        universe_id: Uuid,
        status: ResolutionStatus,
    ) -> Result<Vec<Mention>, StoreError> {
        let inner = self.inner.read().await;
        let mut mentions: Vec<Mention> = inner
            .mentions
            .values()
            .filter(|m| m.universe_id == universe_id && m.status == status)
            .cloned()
            .collect();
        mentions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(mentions)
    }

    async fn mentions_by_segment(&self, segment_id: Uuid) -> Result<Vec<Mention>, StoreError> {
        let inner = self.inner.read().await;
        let mut mentions: Vec<Mention> = inner
            .mentions
            .values()
            .filter(|m| m.segment_id == segment_id)
            .cloned()
            .collect();
        mentions.sort_by_key(|m| m.span_start);
        Ok(mentions)
    }

    async fn mentions_by_entity(&self, entity_id: Uuid) -> Result<Vec<Mention>, StoreError> {
        let inner = self.inner.read().await;
        let mut mentions: Vec<Mention> = inner
            .mentions
            .values()
            .filter(|m| m.entity_id == Some(entity_id))
            .cloned()
            .collect();
        mentions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(mentions)
    }

    async fn create_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.ambiguities.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_ambiguity(&self, id: Uuid) -> Result<Option<AmbiguityItem>, StoreError> {
        Ok(self.inner.read().await.ambiguities.get(&id).cloned())
    }

    async fn update_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.ambiguities.contains_key(&item.id) {
            return Err(StoreError::NotFound {
                kind: "ambiguity item",
                id: item.id,
            });
        }
        inner.ambiguities.insert(item.id, item.clone());
        Ok(())
    }

    async fn ambiguities_by_status(
        &self,
        universe_id: Uuid,
        status: AmbiguityStatus,
    ) -> Result<Vec<AmbiguityItem>, StoreError> {
        let inner = self.inner.read().await;
        let mut items: Vec<AmbiguityItem> = inner
            .ambiguities
            .values()
            .filter(|i| i.universe_id == universe_id && i.status == status)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn create_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound {
                kind: "pipeline run",
                id: run.id,
            });
        }
        inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        Ok(self.inner.read().await.runs.get(&id).cloned())
    }
}
