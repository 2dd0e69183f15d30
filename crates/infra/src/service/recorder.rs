//! Transaction Recorder: the append-only movement log.

use std::sync::Arc;

use labstock_auth::{Permission, Session, authorize};
use labstock_core::{MaterialId, RecordId};
use labstock_inventory::{
    IssueDetails, MaterialBatch, MovementKind, MovementRecord, NewMovement, Operator, RecordQuery,
};

use super::error::{ServiceError, WorkflowStep};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct TransactionRecorder {
    store: Arc<dyn RecordStore>,
}

impl TransactionRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Write one record for `batch` as it is right now.
    ///
    /// Outbound records take the whole lot; inbound ones mirror the intake.
    pub async fn record(
        &self,
        kind: MovementKind,
        batch: &MaterialBatch,
        operator: Operator,
        details: IssueDetails,
    ) -> Result<MovementRecord, ServiceError> {
        let movement = match kind {
            MovementKind::Out => NewMovement::outbound(batch, operator, details)?,
            MovementKind::In => NewMovement::inbound(batch, operator),
        };
        self.append(movement).await
    }

    pub async fn append(&self, movement: NewMovement) -> Result<MovementRecord, ServiceError> {
        let record = self
            .store
            .append(movement)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Record, e))?;
        tracing::debug!(record_id = %record.id, material_id = %record.material_id, kind = %record.kind, "movement recorded");
        Ok(record)
    }

    /// Records matching `query`, newest first.
    pub async fn list(&self, session: &Session, query: &RecordQuery) -> Result<Vec<MovementRecord>, ServiceError> {
        authorize(session, &Permission::RECORDS_READ)?;
        let records = self.all().await?;
        Ok(query.apply(&records))
    }

    pub(crate) async fn all(&self) -> Result<Vec<MovementRecord>, ServiceError> {
        self.store
            .list()
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::List, e))
    }

    pub(crate) async fn for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, ServiceError> {
        self.store
            .list_for_material(material_id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::List, e))
    }

    pub async fn get(&self, session: &Session, id: RecordId) -> Result<MovementRecord, ServiceError> {
        authorize(session, &Permission::RECORDS_READ)?;
        self.store
            .get(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Fetch, e))
    }

    /// Administrative removal of a record. Admins only.
    pub async fn delete(&self, session: &Session, id: RecordId) -> Result<(), ServiceError> {
        authorize(session, &Permission::RECORDS_DELETE)?;
        self.store
            .delete(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Delete, e))?;
        tracing::info!(record_id = %id, by = %session.user_id, "movement record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use labstock_auth::Role;
    use labstock_core::UserId;
    use labstock_inventory::MaterialStatus;

    use crate::store::InMemoryRecordStore;

    fn batch(quantity: u32) -> MaterialBatch {
        let now = Utc::now();
        MaterialBatch {
            id: MaterialId::new(),
            name: "Pb Standard".to_string(),
            code: "GBW08619".to_string(),
            batch_number: None,
            unique_id: "PB-2024-01".to_string(),
            manufacturer: None,
            concentration: None,
            uncertainty: None,
            storage_condition: None,
            quantity,
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            intake_status: MaterialStatus::Normal,
            images: vec![],
            created_by: UserId::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn operator(session: &Session) -> Operator {
        Operator {
            id: session.user_id,
            name: session.name.clone(),
        }
    }

    #[tokio::test]
    async fn outbound_record_takes_the_whole_lot() {
        let recorder = TransactionRecorder::new(Arc::new(InMemoryRecordStore::new()));
        let alice = Session::new(UserId::new(), "Alice", Role::Operator);

        let record = recorder
            .record(MovementKind::Out, &batch(5), operator(&alice), IssueDetails::default())
            .await
            .unwrap();

        assert_eq!(record.kind, MovementKind::Out);
        assert_eq!(record.quantity, 5);
        assert_eq!(record.operator, "Alice");
        assert_eq!(record.material_name, "Pb Standard");
    }

    #[tokio::test]
    async fn only_admins_delete_records() {
        let recorder = TransactionRecorder::new(Arc::new(InMemoryRecordStore::new()));
        let alice = Session::new(UserId::new(), "Alice", Role::Operator);
        let admin = Session::new(UserId::new(), "Root", Role::Admin);

        let record = recorder
            .record(MovementKind::In, &batch(2), operator(&alice), IssueDetails::default())
            .await
            .unwrap();

        assert!(matches!(
            recorder.delete(&alice, record.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        recorder.delete(&admin, record.id).await.unwrap();
        assert_eq!(recorder.get(&admin, record.id).await, Err(ServiceError::NotFound));
    }

    #[tokio::test]
    async fn list_applies_the_query() {
        let recorder = TransactionRecorder::new(Arc::new(InMemoryRecordStore::new()));
        let alice = Session::new(UserId::new(), "Alice", Role::Operator);
        let details = IssueDetails {
            note: Some("for ICP calibration".to_string()),
            ..Default::default()
        };

        recorder
            .record(MovementKind::Out, &batch(1), operator(&alice), details)
            .await
            .unwrap();
        recorder
            .record(MovementKind::In, &batch(4), operator(&alice), IssueDetails::default())
            .await
            .unwrap();

        let by_note = RecordQuery {
            text: Some("icp".to_string()),
            kind: None,
        };
        assert_eq!(recorder.list(&alice, &by_note).await.unwrap().len(), 1);

        let inbound = RecordQuery {
            text: None,
            kind: Some(MovementKind::In),
        };
        let listed = recorder.list(&alice, &inbound).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].quantity, 4);
    }
}
