//! SQLite-backed store for durable canon state.
//!
//! One database file holds entities, aliases, mentions, review items, and
//! pipeline runs. Entity-plus-alias creation runs inside a transaction so
//! a failed alias insert rolls the entity back. Fuzzy matching loads the
//! universe's aliases and scores them in process with the pluggable
//! similarity measure; a production deployment would push this into a
//! trigram index instead.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::{
    normalize, AmbiguityItem, AmbiguityStatus, CandidateRef, Entity, EntityAlias, EntityType,
    Mention, PipelineRun, ProgressSnapshot, ResolutionStatus, RunKind, RunStatus, Severity,
};
use crate::similarity::{NormalizedLevenshtein, Similarity};

use super::{CanonStore, ScoredCandidate, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entities (
    id             TEXT PRIMARY KEY,
    universe_id    TEXT NOT NULL,
    entity_type    TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    created_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_universe ON entities(universe_id);

CREATE TABLE IF NOT EXISTS aliases (
    id          TEXT PRIMARY KEY,
    entity_id   TEXT NOT NULL REFERENCES entities(id),
    display     TEXT NOT NULL,
    normalized  TEXT NOT NULL,
    confidence  REAL NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_aliases_normalized ON aliases(normalized);
CREATE INDEX IF NOT EXISTS idx_aliases_entity ON aliases(entity_id);

CREATE TABLE IF NOT EXISTS mentions (
    id           TEXT PRIMARY KEY,
    universe_id  TEXT NOT NULL,
    segment_id   TEXT NOT NULL,
    entity_id    TEXT,
    surface_form TEXT NOT NULL,
    span_start   INTEGER NOT NULL,
    span_end     INTEGER NOT NULL,
    confidence   REAL NOT NULL,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mentions_universe_status ON mentions(universe_id, status);
CREATE INDEX IF NOT EXISTS idx_mentions_segment ON mentions(segment_id);
CREATE INDEX IF NOT EXISTS idx_mentions_entity ON mentions(entity_id);

CREATE TABLE IF NOT EXISTS ambiguities (
    id               TEXT PRIMARY KEY,
    universe_id      TEXT NOT NULL,
    mention_id       TEXT NOT NULL,
    surface_form     TEXT NOT NULL,
    candidates       TEXT NOT NULL,
    status           TEXT NOT NULL,
    severity         TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    resolved_at      TEXT,
    resolution_notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_ambiguities_universe_status ON ambiguities(universe_id, status);

CREATE TABLE IF NOT EXISTS runs (
    id           TEXT PRIMARY KEY,
    universe_id  TEXT NOT NULL,
    document_id  TEXT NOT NULL,
    kind         TEXT NOT NULL,
    status       TEXT NOT NULL,
    progress     TEXT NOT NULL,
    error        TEXT,
    created_at   TEXT NOT NULL,
    completed_at TEXT
);
";

/// Durable `CanonStore` implementation on a single SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    similarity: Arc<dyn Similarity>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database, useful in tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            similarity: Arc::new(NormalizedLevenshtein),
        })
    }

    /// Replace the similarity scorer used for fuzzy matching
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("store connection lock poisoned".into()))
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Internal(format!("invalid uuid in store: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("invalid timestamp in store: {e}")))
}

fn parse_with<T>(value: Option<T>, field: &str) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Internal(format!("invalid {field} in store")))
}

// Raw row shapes: everything SQLite-native, converted to domain types
// after the statement has finished.

struct EntityRow(String, String, String, String, String);

impl EntityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn into_entity(self) -> Result<Entity, StoreError> {
        Ok(Entity {
            id: parse_uuid(&self.0)?,
            universe_id: parse_uuid(&self.1)?,
            entity_type: parse_with(EntityType::parse(&self.2), "entity type")?,
            canonical_name: self.3,
            created_at: parse_timestamp(&self.4)?,
        })
    }
}

struct MentionRow(
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
    f64,
    String,
    String,
);

impl MentionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ))
    }

    fn into_mention(self) -> Result<Mention, StoreError> {
        Ok(Mention {
            id: parse_uuid(&self.0)?,
            universe_id: parse_uuid(&self.1)?,
            segment_id: parse_uuid(&self.2)?,
            entity_id: self.3.as_deref().map(parse_uuid).transpose()?,
            surface_form: self.4,
            span_start: self.5 as usize,
            span_end: self.6 as usize,
            confidence: self.7,
            status: parse_with(ResolutionStatus::parse(&self.8), "resolution status")?,
            created_at: parse_timestamp(&self.9)?,
        })
    }
}

struct AmbiguityRow(
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

impl AmbiguityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ))
    }

    fn into_item(self) -> Result<AmbiguityItem, StoreError> {
        let candidates: Vec<CandidateRef> = serde_json::from_str(&self.4)?;
        Ok(AmbiguityItem {
            id: parse_uuid(&self.0)?,
            universe_id: parse_uuid(&self.1)?,
            mention_id: parse_uuid(&self.2)?,
            surface_form: self.3,
            candidates,
            status: parse_with(AmbiguityStatus::parse(&self.5), "ambiguity status")?,
            severity: parse_with(Severity::parse(&self.6), "severity")?,
            created_at: parse_timestamp(&self.7)?,
            resolved_at: self.8.as_deref().map(parse_timestamp).transpose()?,
            resolution_notes: self.9,
        })
    }
}

struct RunRow(
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
);

impl RunRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn into_run(self) -> Result<PipelineRun, StoreError> {
        let progress: ProgressSnapshot = serde_json::from_str(&self.5)?;
        Ok(PipelineRun {
            id: parse_uuid(&self.0)?,
            universe_id: parse_uuid(&self.1)?,
            document_id: parse_uuid(&self.2)?,
            kind: parse_with(RunKind::parse(&self.3), "run kind")?,
            status: parse_with(RunStatus::parse(&self.4), "run status")?,
            progress,
            error: self.6,
            created_at: parse_timestamp(&self.7)?,
            completed_at: self.8.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[async_trait]
impl CanonStore for SqliteStore {
    async fn create_entity(
        &self,
        entity: &Entity,
        primary_alias: &EntityAlias,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO entities (id, universe_id, entity_type, canonical_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entity.id.to_string(),
                entity.universe_id.to_string(),
                entity.entity_type.as_str(),
                entity.canonical_name,
                entity.created_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "INSERT INTO aliases (id, entity_id, display, normalized, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                primary_alias.id.to_string(),
                primary_alias.entity_id.to_string(),
                primary_alias.display,
                primary_alias.normalized,
                primary_alias.confidence,
                primary_alias.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn add_alias(&self, alias: &EntityAlias) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO aliases (id, entity_id, display, normalized, confidence, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6
             WHERE EXISTS (SELECT 1 FROM entities WHERE id = ?2)",
            params![
                alias.id.to_string(),
                alias.entity_id.to_string(),
                alias.display,
                alias.normalized,
                alias.confidence,
                alias.created_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: alias.entity_id,
            });
        }
        Ok(())
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, universe_id, entity_type, canonical_name, created_at
                 FROM entities WHERE id = ?1",
                params![id.to_string()],
                EntityRow::read,
            )
            .optional()?;
        row.map(EntityRow::into_entity).transpose()
    }

    async fn list_entities(&self, universe_id: Uuid) -> Result<Vec<Entity>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, universe_id, entity_type, canonical_name, created_at
             FROM entities WHERE universe_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![universe_id.to_string()], EntityRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    async fn find_exact(
        &self,
        normalized: &str,
        universe_id: Uuid,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT e.id, e.universe_id, e.entity_type, e.canonical_name, e.created_at
             FROM aliases a
             JOIN entities e ON e.id = a.entity_id
             WHERE e.universe_id = ?1 AND a.normalized = ?2
             ORDER BY e.canonical_name",
        )?;
        let rows = stmt
            .query_map(params![universe_id.to_string(), normalized], EntityRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| {
                row.into_entity()
                    .map(|entity| ScoredCandidate { entity, score: 1.0 })
            })
            .collect()
    }

    async fn find_similar(
        &self,
        surface_form: &str,
        universe_id: Uuid,
        min_similarity: f64,
        max_results: usize,
    ) -> Result<Vec<ScoredCandidate>, StoreError> {
        let needle = normalize(surface_form);
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT e.id, e.universe_id, e.entity_type, e.canonical_name, e.created_at,
                        a.normalized, a.confidence
                 FROM aliases a
                 JOIN entities e ON e.id = a.entity_id
                 WHERE e.universe_id = ?1",
            )?;
            let collected = stmt
                .query_map(params![universe_id.to_string()], |row| {
                    Ok((
                        EntityRow::read(row)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, f64>(6)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            collected
        };

        let mut best: std::collections::HashMap<Uuid, ScoredCandidate> =
            std::collections::HashMap::new();
        for (entity_row, alias_normalized, alias_confidence) in rows {
            let similarity = self.similarity.score(&needle, &alias_normalized);
            if similarity < min_similarity {
                continue;
            }
            let entity = entity_row.into_entity()?;
            let score = similarity * alias_confidence;
            match best.get(&entity.id) {
                Some(existing) if existing.score >= score => {}
                _ => {
                    best.insert(entity.id, ScoredCandidate { entity, score });
                }
            }
        }

        let mut candidates: Vec<ScoredCandidate> = best.into_values().collect();
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
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for mention in mentions {
            tx.execute(
                "INSERT INTO mentions (id, universe_id, segment_id, entity_id, surface_form,
                                       span_start, span_end, confidence, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    mention.id.to_string(),
                    mention.universe_id.to_string(),
                    mention.segment_id.to_string(),
                    mention.entity_id.map(|id| id.to_string()),
                    mention.surface_form,
                    mention.span_start as i64,
                    mention.span_end as i64,
                    mention.confidence,
                    mention.status.as_str(),
                    mention.created_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn update_mention(&self, mention: &Mention) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE mentions
             SET entity_id = ?2, confidence = ?3, status = ?4
             WHERE id = ?1",
            params![
                mention.id.to_string(),
                mention.entity_id.map(|id| id.to_string()),
                mention.confidence,
                mention.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "mention",
                id: mention.id,
            });
        }
        Ok(())
    }

    async fn get_mention(&self, id: Uuid) -> Result<Option<Mention>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, universe_id, segment_id, entity_id, surface_form,
                        span_start, span_end, confidence, status, created_at
                 FROM mentions WHERE id = ?1",
                params![id.to_string()],
                MentionRow::read,
            )
            .optional()?;
        row.map(MentionRow::into_mention).transpose()
    }

    async fn mentions_by_status(
        &self,
        universe_id: Uuid,
        status: ResolutionStatus,
    ) -> Result<Vec<Mention>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, universe_id, segment_id, entity_id, surface_form,
                    span_start, span_end, confidence, status, created_at
             FROM mentions WHERE universe_id = ?1 AND status = ?2 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(
                params![universe_id.to_string(), status.as_str()],
                MentionRow::read,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(MentionRow::into_mention).collect()
    }

    async fn mentions_by_segment(&self, segment_id: Uuid) -> Result<Vec<Mention>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, universe_id, segment_id, entity_id, surface_form,
                    span_start, span_end, confidence, status, created_at
             FROM mentions WHERE segment_id = ?1 ORDER BY span_start",
        )?;
        let rows = stmt
            .query_map(params![segment_id.to_string()], MentionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(MentionRow::into_mention).collect()
    }

    async fn mentions_by_entity(&self, entity_id: Uuid) -> Result<Vec<Mention>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, universe_id, segment_id, entity_id, surface_form,
                    span_start, span_end, confidence, status, created_at
             FROM mentions WHERE entity_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![entity_id.to_string()], MentionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(MentionRow::into_mention).collect()
    }

    async fn create_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError> {
        let candidates = serde_json::to_string(&item.candidates)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ambiguities (id, universe_id, mention_id, surface_form, candidates,
                                      status, severity, created_at, resolved_at, resolution_notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id.to_string(),
                item.universe_id.to_string(),
                item.mention_id.to_string(),
                item.surface_form,
                candidates,
                item.status.as_str(),
                item.severity.as_str(),
                item.created_at.to_rfc3339(),
                item.resolved_at.map(|t| t.to_rfc3339()),
                item.resolution_notes,
            ],
        )?;
        Ok(())
    }

    async fn get_ambiguity(&self, id: Uuid) -> Result<Option<AmbiguityItem>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, universe_id, mention_id, surface_form, candidates,
                        status, severity, created_at, resolved_at, resolution_notes
                 FROM ambiguities WHERE id = ?1",
                params![id.to_string()],
                AmbiguityRow::read,
            )
            .optional()?;
        row.map(AmbiguityRow::into_item).transpose()
    }

    async fn update_ambiguity(&self, item: &AmbiguityItem) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE ambiguities
             SET status = ?2, resolved_at = ?3, resolution_notes = ?4
             WHERE id = ?1",
            params![
                item.id.to_string(),
                item.status.as_str(),
                item.resolved_at.map(|t| t.to_rfc3339()),
                item.resolution_notes,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "ambiguity item",
                id: item.id,
            });
        }
        Ok(())
    }

    async fn ambiguities_by_status(
        &self,
        universe_id: Uuid,
        status: AmbiguityStatus,
    ) -> Result<Vec<AmbiguityItem>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, universe_id, mention_id, surface_form, candidates,
                    status, severity, created_at, resolved_at, resolution_notes
             FROM ambiguities WHERE universe_id = ?1 AND status = ?2 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(
                params![universe_id.to_string(), status.as_str()],
                AmbiguityRow::read,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(AmbiguityRow::into_item).collect()
    }

    async fn create_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let progress = serde_json::to_string(&run.progress)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (id, universe_id, document_id, kind, status, progress,
                               error, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.id.to_string(),
                run.universe_id.to_string(),
                run.document_id.to_string(),
                run.kind.as_str(),
                run.status.as_str(),
                progress,
                run.error,
                run.created_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let progress = serde_json::to_string(&run.progress)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE runs
             SET status = ?2, progress = ?3, error = ?4, completed_at = ?5
             WHERE id = ?1",
            params![
                run.id.to_string(),
                run.status.as_str(),
                progress,
                run.error,
                run.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "pipeline run",
                id: run.id,
            });
        }
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, universe_id, document_id, kind, status, progress,
                        error, created_at, completed_at
                 FROM runs WHERE id = ?1",
                params![id.to_string()],
                RunRow::read,
            )
            .optional()?;
        row.map(RunRow::into_run).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProgressSnapshot;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_entity_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let universe_id = Uuid::new_v4();
        let entity = Entity::new(universe_id, EntityType::Place, "The Hollow City");
        let alias = EntityAlias::primary(entity.id, &entity.canonical_name);
        store.create_entity(&entity, &alias).await.unwrap();

        let loaded = store.get_entity(entity.id).await.unwrap().unwrap();
        assert_eq!(loaded.canonical_name, "The Hollow City");
        assert_eq!(loaded.entity_type, EntityType::Place);

        let matches = store.find_exact("the hollow city", universe_id).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_fuzzy_match_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("canon.db")).unwrap();
        let universe_id = Uuid::new_v4();
        let entity = Entity::new(universe_id, EntityType::Person, "Morwenna");
        let alias = EntityAlias::primary(entity.id, "Morwenna");
        store.create_entity(&entity, &alias).await.unwrap();

        let matches = store
            .find_similar("Morwena", universe_id, 0.75, 5)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score >= 0.75 && matches[0].score < 1.0);
    }

    #[tokio::test]
    async fn test_fuzzy_match_is_tenant_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let universe_a = Uuid::new_v4();
        let entity = Entity::new(universe_a, EntityType::Person, "Morwenna");
        let alias = EntityAlias::primary(entity.id, "Morwenna");
        store.create_entity(&entity, &alias).await.unwrap();

        let other = store
            .find_similar("Morwenna", Uuid::new_v4(), 0.75, 5)
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_mention_update_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let universe_id = Uuid::new_v4();
        let mut mention = Mention::detected(universe_id, Uuid::new_v4(), "Morwenna", 4, 12, 0.7);
        store.insert_mentions(std::slice::from_ref(&mention)).await.unwrap();

        let entity_id = Uuid::new_v4();
        mention.link(entity_id);
        store.update_mention(&mention).await.unwrap();

        let loaded = store.get_mention(mention.id).await.unwrap().unwrap();
        assert_eq!(loaded.entity_id, Some(entity_id));
        assert_eq!(loaded.status, ResolutionStatus::Resolved);
        assert_eq!(loaded.span_start, 4);
        assert_eq!(loaded.span_end, 12);
    }

    #[tokio::test]
    async fn test_ambiguity_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let universe_id = Uuid::new_v4();
        let entity = Entity::new(universe_id, EntityType::Person, "Alice");
        let item = AmbiguityItem::identity_conflict(
            universe_id,
            Uuid::new_v4(),
            "Alice",
            vec![CandidateRef::new(&entity, 0.85)],
        );
        store.create_ambiguity(&item).await.unwrap();

        let open = store
            .ambiguities_by_status(universe_id, AmbiguityStatus::Open)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].candidates.len(), 1);
        assert_eq!(open[0].candidates[0].canonical_name, "Alice");
    }

    #[tokio::test]
    async fn test_run_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut run = PipelineRun::ingest(Uuid::new_v4(), Uuid::new_v4(), 3);
        store.create_run(&run).await.unwrap();

        run.succeed(ProgressSnapshot::complete(3, 9, 6, 2, 1));
        store.update_run(&run).await.unwrap();

        let loaded = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Succeeded);
        assert_eq!(loaded.progress.candidates, Some(2));
        assert!(loaded.completed_at.is_some());
    }
}
