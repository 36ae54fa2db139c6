//! Entity Resolution Integration Tests
//!
//! Exercises the decision table end to end against the in-memory store:
//! exact matching, threshold branches, batch dedup, tenant isolation,
//! and single-entity creation under concurrent resolution.

use std::collections::HashMap;
use std::sync::Arc;

use loreweave::core::{Decision, EntityResolver};
use loreweave::domain::{AmbiguityStatus, Entity, EntityAlias, EntityType, Mention, ResolutionStatus};
use loreweave::similarity::Similarity;
use loreweave::store::{CanonStore, MemoryStore};
use uuid::Uuid;

/// Scores a needle against an alias by table lookup, for tests that need
/// exact candidate scores on the decision boundaries.
struct TableSimilarity {
    by_alias: HashMap<&'static str, f64>,
}

impl TableSimilarity {
    fn new(entries: &[(&'static str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            by_alias: entries.iter().copied().collect(),
        })
    }
}

impl Similarity for TableSimilarity {
    fn score(&self, _needle: &str, alias: &str) -> f64 {
        self.by_alias.get(alias).copied().unwrap_or(0.0)
    }
}

fn mention(universe_id: Uuid, surface: &str, confidence: f64) -> Mention {
    Mention::detected(universe_id, Uuid::new_v4(), surface, 10, 10 + surface.len(), confidence)
}

async fn seed(store: &dyn CanonStore, universe_id: Uuid, name: &str, alias_confidence: f64) -> Entity {
    let entity = Entity::new(universe_id, EntityType::Person, name);
    let alias = EntityAlias::new(entity.id, name, alias_confidence);
    store.create_entity(&entity, &alias).await.unwrap();
    entity
}

#[tokio::test]
async fn test_exact_match_scores_one_regardless_of_alias_confidence() {
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::new());
    let universe_id = Uuid::new_v4();
    // stored alias confidence well below the high-confidence threshold
    let entity = seed(store.as_ref(), universe_id, "Alice", 0.6).await;

    let resolver = EntityResolver::new(store.clone());
    let mut m = mention(universe_id, "Alice", 0.7);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    let decision = resolver.resolve(&mut m).await.unwrap();
    assert_eq!(
        decision,
        Decision::Linked {
            entity_id: entity.id,
            score: 1.0
        }
    );
    assert_eq!(m.status, ResolutionStatus::Resolved);
    assert_eq!(m.entity_id, Some(entity.id));
    // mention confidence untouched on a high-confidence link
    assert!((m.confidence - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_match_mints_entity_with_primary_alias() {
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::new());
    let universe_id = Uuid::new_v4();
    let resolver = EntityResolver::new(store.clone());

    let mut m = mention(universe_id, "The Hollow City", 0.9);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    let decision = resolver.resolve(&mut m).await.unwrap();
    let Decision::Minted { entity_id } = decision else {
        panic!("expected a minted entity, got {decision:?}");
    };

    let entity = store.get_entity(entity_id).await.unwrap().unwrap();
    assert_eq!(entity.canonical_name, "The Hollow City");
    assert_eq!(entity.entity_type, EntityType::Place);

    // the primary alias makes the new entity visible to exact matching
    let matches = store.find_exact("the hollow city", universe_id).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entity.id, entity_id);
}

#[tokio::test]
async fn test_duplicate_surface_forms_in_batch_mint_once() {
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::new());
    let universe_id = Uuid::new_v4();
    let resolver = EntityResolver::new(store.clone());

    let mut mentions = vec![
        mention(universe_id, "Alice", 0.7),
        mention(universe_id, "Alice", 0.8),
    ];
    store.insert_mentions(&mentions).await.unwrap();

    let decisions = resolver.resolve_batch(&mut mentions).await.unwrap();

    assert!(matches!(decisions[0], Decision::Minted { .. }));
    assert!(matches!(decisions[1], Decision::Linked { .. }));

    let entities = store.list_entities(universe_id).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(mentions[0].entity_id, Some(entities[0].id));
    assert_eq!(mentions[1].entity_id, Some(entities[0].id));
}

#[tokio::test]
async fn test_two_close_candidates_escalate() {
    let similarity = TableSimilarity::new(&[("alyce", 0.85), ("alize", 0.82)]);
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::with_similarity(similarity));
    let universe_id = Uuid::new_v4();
    let first = seed(store.as_ref(), universe_id, "Alyce", 1.0).await;
    let second = seed(store.as_ref(), universe_id, "Alize", 1.0).await;

    let resolver = EntityResolver::new(store.clone());
    let mut m = mention(universe_id, "Alicce", 0.7);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    let decision = resolver.resolve(&mut m).await.unwrap();
    let Decision::Escalated { item_id, candidates } = decision else {
        panic!("expected escalation, got {decision:?}");
    };
    assert_eq!(candidates, 2);
    assert_eq!(m.status, ResolutionStatus::Candidate);
    assert!(m.entity_id.is_none());

    let items = store
        .ambiguities_by_status(universe_id, AmbiguityStatus::Open)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, item_id);
    assert_eq!(items[0].mention_id, m.id);

    // ranked descending by score
    assert_eq!(items[0].candidates.len(), 2);
    assert_eq!(items[0].candidates[0].entity_id, first.id);
    assert!((items[0].candidates[0].score - 0.85).abs() < 1e-9);
    assert_eq!(items[0].candidates[1].entity_id, second.id);
    assert!((items[0].candidates[1].score - 0.82).abs() < 1e-9);
}

#[tokio::test]
async fn test_single_mid_band_candidate_links_with_clamped_confidence() {
    let similarity = TableSimilarity::new(&[("brame", 0.80)]);
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::with_similarity(similarity));
    let universe_id = Uuid::new_v4();
    let entity = seed(store.as_ref(), universe_id, "Brame", 1.0).await;

    let resolver = EntityResolver::new(store.clone());
    let mut m = mention(universe_id, "Bramm", 0.9);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    let decision = resolver.resolve(&mut m).await.unwrap();
    assert_eq!(
        decision,
        Decision::LinkedWeak {
            entity_id: entity.id,
            score: 0.80
        }
    );
    assert_eq!(m.status, ResolutionStatus::Resolved);
    assert_eq!(m.entity_id, Some(entity.id));
    assert!((m.confidence - 0.80).abs() < 1e-9);
}

#[tokio::test]
async fn test_below_threshold_candidate_leaves_mention_unresolved() {
    // raw similarity passes the store filter, but the alias's own
    // confidence drags the candidate score to 0.60
    let similarity = TableSimilarity::new(&[("veyl", 0.80)]);
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::with_similarity(similarity));
    let universe_id = Uuid::new_v4();
    seed(store.as_ref(), universe_id, "Veyl", 0.75).await;

    let resolver = EntityResolver::new(store.clone());
    let mut m = mention(universe_id, "Veil", 0.7);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    let decision = resolver.resolve(&mut m).await.unwrap();
    assert_eq!(decision, Decision::Unresolved);
    assert_eq!(m.status, ResolutionStatus::Unresolved);
    assert!(m.entity_id.is_none());

    // no side effects: nothing minted, nothing escalated
    assert_eq!(store.list_entities(universe_id).await.unwrap().len(), 1);
    assert!(store
        .ambiguities_by_status(universe_id, AmbiguityStatus::Open)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_resolution_is_tenant_scoped() {
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::new());
    let universe_a = Uuid::new_v4();
    let universe_b = Uuid::new_v4();
    let alice_a = seed(store.as_ref(), universe_a, "Alice", 1.0).await;

    let resolver = EntityResolver::new(store.clone());
    let mut m = mention(universe_b, "Alice", 0.7);
    store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();

    // no cross-tenant match: universe B mints its own Alice
    let decision = resolver.resolve(&mut m).await.unwrap();
    let Decision::Minted { entity_id } = decision else {
        panic!("expected a minted entity, got {decision:?}");
    };
    assert_ne!(entity_id, alice_a.id);
    assert_eq!(store.list_entities(universe_b).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_resolution_creates_one_entity() {
    let store: Arc<dyn CanonStore> = Arc::new(MemoryStore::new());
    let universe_id = Uuid::new_v4();
    let resolver = Arc::new(EntityResolver::new(store.clone()));

    let mut mentions = Vec::new();
    for _ in 0..8 {
        let m = mention(universe_id, "Morwenna", 0.7);
        store.insert_mentions(std::slice::from_ref(&m)).await.unwrap();
        mentions.push(m);
    }

    let mut handles = Vec::new();
    for mut m in mentions {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            resolver.resolve(&mut m).await.unwrap();
            m
        }));
    }

    let mut linked = Vec::new();
    for handle in handles {
        linked.push(handle.await.unwrap());
    }

    let entities = store.list_entities(universe_id).await.unwrap();
    assert_eq!(entities.len(), 1, "concurrent callers must not double-mint");
    for m in linked {
        assert_eq!(m.entity_id, Some(entities[0].id));
        assert_eq!(m.status, ResolutionStatus::Resolved);
    }
}
