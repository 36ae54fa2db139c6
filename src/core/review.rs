//! Human review of ambiguous identity matches.
//!
//! Open items either get resolved (a reviewer picks the right entity,
//! which also finalizes the mention) or dismissed (the mention stays a
//! Candidate). Both outcomes are terminal; touching a non-Open item is a
//! state error.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::{AmbiguityItem, AmbiguityStatus, ResolutionStatus};
use crate::store::{CanonStore, StoreError};

/// Errors raised by review operations
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("ambiguity item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("mention not found: {0}")]
    MentionNotFound(Uuid),

    #[error("entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("invalid transition: item {id} is {status:?}, only open items can be reviewed")]
    InvalidTransition { id: Uuid, status: AmbiguityStatus },

    #[error("mention {0} is already resolved")]
    MentionAlreadyResolved(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// State machine over Open ambiguity items
pub struct ReviewWorkflow {
    store: Arc<dyn CanonStore>,
}

impl ReviewWorkflow {
    pub fn new(store: Arc<dyn CanonStore>) -> Self {
        Self { store }
    }

    /// Resolve an Open item: record the choice and link the referenced
    /// mention to the chosen entity.
    pub async fn resolve(
        &self,
        item_id: Uuid,
        chosen_entity_id: Uuid,
        notes: Option<String>,
    ) -> Result<AmbiguityItem, ReviewError> {
        let mut item = self.open_item(item_id).await?;

        if self.store.get_entity(chosen_entity_id).await?.is_none() {
            return Err(ReviewError::EntityNotFound(chosen_entity_id));
        }

        let mut mention = self
            .store
            .get_mention(item.mention_id)
            .await?
            .ok_or(ReviewError::MentionNotFound(item.mention_id))?;
        if mention.status == ResolutionStatus::Resolved {
            return Err(ReviewError::MentionAlreadyResolved(mention.id));
        }

        mention.link(chosen_entity_id);
        self.store.update_mention(&mention).await?;

        item.status = AmbiguityStatus::Resolved;
        item.resolved_at = Some(Utc::now());
        item.resolution_notes = notes;
        self.store.update_ambiguity(&item).await?;

        info!(
            item = %item.id,
            mention = %mention.id,
            entity = %chosen_entity_id,
            "Resolved ambiguity"
        );
        Ok(item)
    }

    /// Dismiss an Open item without altering the referenced mention.
    pub async fn dismiss(
        &self,
        item_id: Uuid,
        notes: Option<String>,
    ) -> Result<AmbiguityItem, ReviewError> {
        let mut item = self.open_item(item_id).await?;

        item.status = AmbiguityStatus::Dismissed;
        item.resolved_at = Some(Utc::now());
        item.resolution_notes = notes;
        self.store.update_ambiguity(&item).await?;

        info!(item = %item.id, "Dismissed ambiguity");
        Ok(item)
    }

    async fn open_item(&self, item_id: Uuid) -> Result<AmbiguityItem, ReviewError> {
        let item = self
            .store
            .get_ambiguity(item_id)
            .await?
            .ok_or(ReviewError::ItemNotFound(item_id))?;
        if item.status.is_terminal() {
            return Err(ReviewError::InvalidTransition {
                id: item.id,
                status: item.status,
            });
        }
        Ok(item)
    }
}
