//! Persistence boundary for batches, movement records, issuance intents and messages.
//!
//! Every trait has an in-memory implementation (tests/dev) and a Postgres one.
//! Listings come back newest first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use labstock_core::{ExpectedVersion, IntentId, MaterialId, MessageId, RecordId, UserId};
use labstock_inventory::{MaterialBatch, MaterialChanges, MovementRecord, NewMaterial, NewMovement};
use labstock_messages::{Message, NewMessage};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{
    InMemoryIssuanceJournal, InMemoryMaterialRepository, InMemoryMessageStore, InMemoryRecordStore,
};
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rejected by store: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Transport(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Transport("lock poisoned".to_string())
    }
}

/// Material batches.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// All batches, newest first.
    async fn list(&self) -> Result<Vec<MaterialBatch>, StoreError>;

    async fn get(&self, id: MaterialId) -> Result<MaterialBatch, StoreError>;

    /// Insert a validated batch. The store assigns id, version 1 and timestamps.
    async fn create(&self, new: NewMaterial) -> Result<MaterialBatch, StoreError>;

    /// Apply an edit and bump the version.
    async fn update(&self, id: MaterialId, changes: MaterialChanges) -> Result<MaterialBatch, StoreError>;

    /// Remove a batch if its version still matches `expected`.
    ///
    /// `NotFound` if the row is gone, `Conflict` on a version mismatch.
    async fn delete(&self, id: MaterialId, expected: ExpectedVersion) -> Result<(), StoreError>;
}

/// Append-only movement log (records are never edited, admins may delete).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append(&self, new: NewMovement) -> Result<MovementRecord, StoreError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<MovementRecord>, StoreError>;

    /// Records referencing `material_id`, newest first.
    async fn list_for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, StoreError>;

    async fn get(&self, id: RecordId) -> Result<MovementRecord, StoreError>;

    async fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    /// Batch fetched, no record written yet.
    Opened,
    /// Outbound record written, batch not yet removed.
    Recorded,
    /// Batch removed; the issuance is complete.
    Committed,
    /// Given up before anything durable happened (or found harmless on reconcile).
    Abandoned,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::Opened => "opened",
            IntentState::Recorded => "recorded",
            IntentState::Committed => "committed",
            IntentState::Abandoned => "abandoned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "opened" => Some(IntentState::Opened),
            "recorded" => Some(IntentState::Recorded),
            "committed" => Some(IntentState::Committed),
            "abandoned" => Some(IntentState::Abandoned),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, IntentState::Opened | IntentState::Recorded)
    }
}

/// One issuance attempt, journalled so an interrupted issue can be finished or undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceIntent {
    pub id: IntentId,
    pub material_id: MaterialId,
    /// Batch version seen at fetch time; the delete is conditional on it.
    pub material_version: u64,
    pub operator_id: UserId,
    pub record_id: Option<RecordId>,
    pub state: IntentState,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compensation log for the issue workflow.
///
/// At most one live (non-abandoned) intent exists per batch. Opening a second
/// one fails with `Conflict`, which is what serialises concurrent issuances.
#[async_trait]
pub trait IssuanceJournal: Send + Sync {
    async fn open(
        &self,
        material_id: MaterialId,
        material_version: u64,
        operator_id: UserId,
    ) -> Result<IssuanceIntent, StoreError>;

    async fn mark_recorded(&self, id: IntentId, record_id: RecordId) -> Result<(), StoreError>;

    async fn commit(&self, id: IntentId) -> Result<(), StoreError>;

    async fn abandon(&self, id: IntentId) -> Result<(), StoreError>;

    /// Intents still `Opened` or `Recorded`, oldest first.
    async fn pending(&self) -> Result<Vec<IssuanceIntent>, StoreError>;
}

/// Internal notices.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Messages addressed to `user` directly or broadcast, newest first.
    async fn list_for(&self, user: UserId) -> Result<Vec<Message>, StoreError>;

    async fn get(&self, id: MessageId) -> Result<Message, StoreError>;

    /// Add `user` to `read_by` (no-op if already there) and return the message.
    async fn mark_read(&self, id: MessageId, user: UserId) -> Result<Message, StoreError>;

    async fn delete(&self, id: MessageId) -> Result<(), StoreError>;
}

#[async_trait]
impl<T> MaterialRepository for Arc<T>
where
    T: MaterialRepository + ?Sized,
{
    async fn list(&self) -> Result<Vec<MaterialBatch>, StoreError> {
        (**self).list().await
    }

    async fn get(&self, id: MaterialId) -> Result<MaterialBatch, StoreError> {
        (**self).get(id).await
    }

    async fn create(&self, new: NewMaterial) -> Result<MaterialBatch, StoreError> {
        (**self).create(new).await
    }

    async fn update(&self, id: MaterialId, changes: MaterialChanges) -> Result<MaterialBatch, StoreError> {
        (**self).update(id, changes).await
    }

    async fn delete(&self, id: MaterialId, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).delete(id, expected).await
    }
}

#[async_trait]
impl<T> RecordStore for Arc<T>
where
    T: RecordStore + ?Sized,
{
    async fn append(&self, new: NewMovement) -> Result<MovementRecord, StoreError> {
        (**self).append(new).await
    }

    async fn list(&self) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).list().await
    }

    async fn list_for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).list_for_material(material_id).await
    }

    async fn get(&self, id: RecordId) -> Result<MovementRecord, StoreError> {
        (**self).get(id).await
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
