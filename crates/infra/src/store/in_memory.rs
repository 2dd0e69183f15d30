//! Process-local stores for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use labstock_core::{ExpectedVersion, IntentId, MaterialId, MessageId, RecordId, UserId};
use labstock_inventory::{MaterialBatch, MaterialChanges, MovementRecord, NewMaterial, NewMovement};
use labstock_messages::{Message, NewMessage};

use super::{
    IntentState, IssuanceIntent, IssuanceJournal, MaterialRepository, MessageStore, RecordStore,
    StoreError,
};

#[derive(Debug, Default)]
pub struct InMemoryMaterialRepository {
    inner: RwLock<HashMap<MaterialId, MaterialBatch>>,
}

impl InMemoryMaterialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed batch (fixtures with back-dated timestamps or odd versions).
    pub fn seed(&self, batch: MaterialBatch) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(batch.id, batch);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn list(&self) -> Result<Vec<MaterialBatch>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut batches: Vec<MaterialBatch> = map.values().cloned().collect();
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(batches)
    }

    async fn get(&self, id: MaterialId) -> Result<MaterialBatch, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        map.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create(&self, new: NewMaterial) -> Result<MaterialBatch, StoreError> {
        let batch = MaterialBatch::from_new(MaterialId::new(), new, Utc::now());
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        map.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn update(&self, id: MaterialId, changes: MaterialChanges) -> Result<MaterialBatch, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let batch = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        changes.apply_to(batch);
        batch.version += 1;
        batch.updated_at = Utc::now();
        Ok(batch.clone())
    }

    async fn delete(&self, id: MaterialId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let current = map.get(&id).ok_or(StoreError::NotFound)?;
        expected
            .check(current.version)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        map.remove(&id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<Vec<MovementRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, new: NewMovement) -> Result<MovementRecord, StoreError> {
        let record = MovementRecord::from_new(RecordId::new(), new, Utc::now());
        let mut records = self.inner.write().map_err(|_| StoreError::poisoned())?;
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<MovementRecord>, StoreError> {
        let records = self.inner.read().map_err(|_| StoreError::poisoned())?;
        // Appended in order, so reversing gives newest first.
        Ok(records.iter().rev().cloned().collect())
    }

    async fn list_for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, StoreError> {
        let records = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.material_id == material_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: RecordId) -> Result<MovementRecord, StoreError> {
        let records = self.inner.read().map_err(|_| StoreError::poisoned())?;
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let mut records = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIssuanceJournal {
    inner: RwLock<Vec<IssuanceIntent>>,
}

impl InMemoryIssuanceJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every intent ever opened, oldest first.
    pub fn all(&self) -> Vec<IssuanceIntent> {
        self.inner.read().map(|i| i.clone()).unwrap_or_default()
    }

    fn transition(
        &self,
        id: IntentId,
        allowed_from: &[IntentState],
        to: IntentState,
        record_id: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let mut intents = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let intent = intents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound)?;
        if !allowed_from.contains(&intent.state) {
            return Err(StoreError::Conflict(format!(
                "intent {id} is {} and cannot become {}",
                intent.state.as_str(),
                to.as_str()
            )));
        }
        intent.state = to;
        if record_id.is_some() {
            intent.record_id = record_id;
        }
        intent.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl IssuanceJournal for InMemoryIssuanceJournal {
    async fn open(
        &self,
        material_id: MaterialId,
        material_version: u64,
        operator_id: UserId,
    ) -> Result<IssuanceIntent, StoreError> {
        let mut intents = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if let Some(live) = intents
            .iter()
            .find(|i| i.material_id == material_id && i.state != IntentState::Abandoned)
        {
            return Err(StoreError::Conflict(format!(
                "batch {material_id} already has a {} issuance",
                live.state.as_str()
            )));
        }

        let now = Utc::now();
        let intent = IssuanceIntent {
            id: IntentId::new(),
            material_id,
            material_version,
            operator_id,
            record_id: None,
            state: IntentState::Opened,
            opened_at: now,
            updated_at: now,
        };
        intents.push(intent.clone());
        Ok(intent)
    }

    async fn mark_recorded(&self, id: IntentId, record_id: RecordId) -> Result<(), StoreError> {
        self.transition(id, &[IntentState::Opened], IntentState::Recorded, Some(record_id))
    }

    async fn commit(&self, id: IntentId) -> Result<(), StoreError> {
        self.transition(
            id,
            &[IntentState::Opened, IntentState::Recorded],
            IntentState::Committed,
            None,
        )
    }

    async fn abandon(&self, id: IntentId) -> Result<(), StoreError> {
        self.transition(
            id,
            &[IntentState::Opened, IntentState::Recorded],
            IntentState::Abandoned,
            None,
        )
    }

    async fn pending(&self) -> Result<Vec<IssuanceIntent>, StoreError> {
        let intents = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(intents.iter().filter(|i| i.state.is_pending()).cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<Vec<Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message::from_new(MessageId::new(), new, Utc::now());
        let mut messages = self.inner.write().map_err(|_| StoreError::poisoned())?;
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_for(&self, user: UserId) -> Result<Vec<Message>, StoreError> {
        let messages = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(messages
            .iter()
            .rev()
            .filter(|m| m.recipient.includes(user))
            .cloned()
            .collect())
    }

    async fn get(&self, id: MessageId) -> Result<Message, StoreError> {
        let messages = self.inner.read().map_err(|_| StoreError::poisoned())?;
        messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn mark_read(&self, id: MessageId, user: UserId) -> Result<Message, StoreError> {
        let mut messages = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound)?;
        message.mark_read(user);
        Ok(message.clone())
    }

    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        let mut messages = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        if messages.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use labstock_inventory::{MaterialStatus, MovementKind, Operator};

    fn new_material(name: &str, quantity: u32) -> NewMaterial {
        NewMaterial {
            name: name.to_string(),
            code: "GBW-01".to_string(),
            batch_number: None,
            unique_id: format!("{name}-1"),
            manufacturer: None,
            concentration: None,
            uncertainty: None,
            storage_condition: None,
            quantity,
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            intake_status: MaterialStatus::Normal,
            images: vec![],
            created_by: UserId::new(),
        }
    }

    #[tokio::test]
    async fn update_bumps_version_and_delete_checks_it() {
        let repo = InMemoryMaterialRepository::new();
        let batch = repo.create(new_material("Pb Standard", 5)).await.unwrap();
        assert_eq!(batch.version, 1);

        let changes = MaterialChanges {
            quantity: Some(3),
            ..Default::default()
        };
        let edited = repo.update(batch.id, changes).await.unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(edited.quantity, 3);

        let stale = repo.delete(batch.id, ExpectedVersion::Exact(1)).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        repo.delete(batch.id, ExpectedVersion::Exact(2)).await.unwrap();
        assert_eq!(repo.get(batch.id).await, Err(StoreError::NotFound));
        assert_eq!(
            repo.delete(batch.id, ExpectedVersion::Any).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let repo = InMemoryMaterialRepository::new();
        let first = repo.create(new_material("A", 1)).await.unwrap();
        let second = repo.create(new_material("B", 1)).await.unwrap();

        let ids: Vec<MaterialId> = repo.list().await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn journal_allows_one_live_intent_per_batch() {
        let journal = InMemoryIssuanceJournal::new();
        let material = MaterialId::new();
        let operator = UserId::new();

        let first = journal.open(material, 1, operator).await.unwrap();
        assert!(matches!(
            journal.open(material, 1, operator).await,
            Err(StoreError::Conflict(_))
        ));

        journal.abandon(first.id).await.unwrap();
        let second = journal.open(material, 1, operator).await.unwrap();
        journal.mark_recorded(second.id, RecordId::new()).await.unwrap();
        journal.commit(second.id).await.unwrap();

        // Committed intents keep blocking: the batch has been issued.
        assert!(matches!(
            journal.open(material, 1, operator).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(journal.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn journal_rejects_transitions_out_of_final_states() {
        let journal = InMemoryIssuanceJournal::new();
        let intent = journal.open(MaterialId::new(), 1, UserId::new()).await.unwrap();
        journal.commit(intent.id).await.unwrap();

        assert!(matches!(journal.abandon(intent.id).await, Err(StoreError::Conflict(_))));
        assert!(matches!(
            journal.mark_recorded(intent.id, RecordId::new()).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(journal.commit(IntentId::new()).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn record_store_filters_by_material() {
        let store = InMemoryRecordStore::new();
        let operator = Operator {
            id: UserId::new(),
            name: "Alice".to_string(),
        };
        let target = MaterialId::new();
        for material_id in [target, MaterialId::new(), target] {
            store
                .append(NewMovement {
                    kind: MovementKind::Out,
                    material_id,
                    material_name: "Pb Standard".to_string(),
                    quantity: 1,
                    operator: operator.clone(),
                    purpose: None,
                    note: None,
                    images: vec![],
                })
                .await
                .unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 3);
        assert_eq!(store.list_for_material(target).await.unwrap().len(), 2);

        let id = store.list().await.unwrap()[0].id;
        store.delete(id).await.unwrap();
        assert_eq!(store.get(id).await, Err(StoreError::NotFound));
    }
}
