//! Whole-workflow tests over in-memory stores.
//!
//! Covers intake, edit, issuance (including the concurrent and partially
//! failed cases), refresh behaviour and issuance reconciliation.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Days, NaiveDate};
    use tokio::sync::Notify;

    use labstock_auth::{Role, Session};
    use labstock_core::{ExpectedVersion, FixedClock, MaterialId, UserId};
    use labstock_inventory::{
        InventoryChanged, IssueDetails, MaterialBatch, MaterialChanges, MaterialDraft,
        MaterialPatch, MaterialQuery, MaterialStatus, MovementKind, MovementRecord, NewMaterial,
        NewMovement, Operator, RecordQuery,
    };

    use crate::config::IntakeAudit;
    use crate::service::{ServiceError, InventoryService, InventorySettings, TransactionRecorder, WorkflowStep};
    use crate::store::{
        InMemoryIssuanceJournal, InMemoryMaterialRepository, InMemoryRecordStore, IntentState,
        IssuanceJournal, MaterialRepository, RecordStore, StoreError,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn alice() -> Session {
        Session::new(UserId::new(), "Alice", Role::Operator)
    }

    fn admin() -> Session {
        Session::new(UserId::new(), "Lab Admin", Role::Admin)
    }

    fn draft(name: &str, quantity: i64, expiry: NaiveDate) -> MaterialDraft {
        MaterialDraft {
            name: name.to_string(),
            code: "GBW08619".to_string(),
            unique_id: format!("{name}-001"),
            quantity,
            expiry_date: expiry.format("%Y-%m-%d").to_string(),
            ..Default::default()
        }
    }

    fn in_days(days: u64) -> NaiveDate {
        today().checked_add_days(Days::new(days)).unwrap()
    }

    fn days_ago(days: u64) -> NaiveDate {
        today().checked_sub_days(Days::new(days)).unwrap()
    }

    /// Material repository with switchable faults.
    ///
    /// `yield_after_get` parks the caller once after every fetch so that two
    /// issuances driven by `tokio::join!` both pass the fetch before either writes.
    /// `hold_next_list` lets one listing be taken and then parked until released.
    #[derive(Default)]
    struct FaultyRepository {
        inner: Arc<InMemoryMaterialRepository>,
        fail_delete: AtomicBool,
        fail_list: AtomicBool,
        yield_after_get: AtomicBool,
        fail_get_for: Mutex<Option<MaterialId>>,
        hold_next_list: Mutex<Option<ListHold>>,
    }

    #[derive(Clone, Default)]
    struct ListHold {
        listed: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl FaultyRepository {
        fn hold_next_list(&self) -> ListHold {
            let hold = ListHold::default();
            *self.hold_next_list.lock().unwrap() = Some(hold.clone());
            hold
        }
    }

    #[async_trait]
    impl MaterialRepository for FaultyRepository {
        async fn list(&self) -> Result<Vec<MaterialBatch>, StoreError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(StoreError::Transport("connection reset".into()));
            }
            let listed = self.inner.list().await;
            let hold = self.hold_next_list.lock().unwrap().take();
            if let Some(hold) = hold {
                hold.listed.notify_one();
                hold.release.notified().await;
            }
            listed
        }

        async fn get(&self, id: MaterialId) -> Result<MaterialBatch, StoreError> {
            if *self.fail_get_for.lock().unwrap() == Some(id) {
                return Err(StoreError::Transport("read timed out".into()));
            }
            let batch = self.inner.get(id).await;
            if self.yield_after_get.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            batch
        }

        async fn create(&self, new: NewMaterial) -> Result<MaterialBatch, StoreError> {
            self.inner.create(new).await
        }

        async fn update(&self, id: MaterialId, changes: MaterialChanges) -> Result<MaterialBatch, StoreError> {
            self.inner.update(id, changes).await
        }

        async fn delete(&self, id: MaterialId, expected: ExpectedVersion) -> Result<(), StoreError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StoreError::Transport("timeout while deleting".into()));
            }
            self.inner.delete(id, expected).await
        }
    }

    #[derive(Default)]
    struct FaultyRecordStore {
        inner: Arc<InMemoryRecordStore>,
        fail_append: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for FaultyRecordStore {
        async fn append(&self, new: NewMovement) -> Result<MovementRecord, StoreError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Transport("records table unavailable".into()));
            }
            self.inner.append(new).await
        }

        async fn list(&self) -> Result<Vec<MovementRecord>, StoreError> {
            self.inner.list().await
        }

        async fn list_for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, StoreError> {
            self.inner.list_for_material(material_id).await
        }

        async fn get(&self, id: labstock_core::RecordId) -> Result<MovementRecord, StoreError> {
            self.inner.get(id).await
        }

        async fn delete(&self, id: labstock_core::RecordId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    struct Harness {
        service: InventoryService,
        materials: Arc<FaultyRepository>,
        records: Arc<FaultyRecordStore>,
        journal: Arc<InMemoryIssuanceJournal>,
    }

    impl Harness {
        async fn records(&self) -> Vec<MovementRecord> {
            self.records.list().await.unwrap()
        }

        async fn batches(&self) -> Vec<MaterialBatch> {
            self.materials.inner.list().await.unwrap()
        }
    }

    fn setup_with(settings: InventorySettings) -> Harness {
        let materials = Arc::new(FaultyRepository::default());
        let records = Arc::new(FaultyRecordStore::default());
        let journal = Arc::new(InMemoryIssuanceJournal::new());
        let service = InventoryService::new(
            materials.clone(),
            TransactionRecorder::new(records.clone()),
            journal.clone(),
            Arc::new(FixedClock::on(today())),
            settings,
        );
        Harness {
            service,
            materials,
            records,
            journal,
        }
    }

    fn setup() -> Harness {
        setup_with(InventorySettings::default())
    }

    #[tokio::test]
    async fn pb_standard_is_issued_in_full_and_disappears() {
        let h = setup();
        let alice = alice();
        let changes = h.service.subscribe();

        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();
        assert_eq!(batch.status, MaterialStatus::Warning);

        let issued = h
            .service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap();
        assert_eq!(issued.record.kind, MovementKind::Out);
        assert_eq!(issued.record.material_name, "Pb Standard");
        assert_eq!(issued.record.quantity, 5);
        assert_eq!(issued.record.operator, "Alice");

        let listed = h.service.materials(&alice, &MaterialQuery::default()).await.unwrap();
        assert!(listed.iter().all(|v| v.batch.id != batch.batch.id));
        assert_eq!(h.records().await.len(), 1);

        let journal = h.journal.all();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].state, IntentState::Committed);
        assert_eq!(journal[0].record_id, Some(issued.record.id));

        let published = changes.drain();
        assert!(matches!(published[0], InventoryChanged::BatchRegistered { .. }));
        assert!(matches!(
            published[1],
            InventoryChanged::BatchIssued { record_id, .. } if record_id == issued.record.id
        ));
    }

    #[tokio::test]
    async fn empty_expired_batch_counts_as_low() {
        let h = setup();
        let alice = alice();

        let batch = h
            .service
            .register(&alice, draft("Cd Standard", 0, days_ago(1)))
            .await
            .unwrap();
        assert_eq!(batch.status, MaterialStatus::Low);

        let overview = h.service.overview(&alice, None).await.unwrap();
        assert_eq!(overview.counts.low, 1);
        assert_eq!(overview.counts.expired, 0);
        assert_eq!(overview.counts.total, 1);
    }

    #[tokio::test]
    async fn edit_to_zero_is_low_at_next_read() {
        let h = setup();
        let alice = alice();

        let batch = h
            .service
            .register(&alice, draft("Hg Standard", 3, in_days(100)))
            .await
            .unwrap();
        assert_eq!(batch.status, MaterialStatus::Normal);

        let patch = MaterialPatch {
            quantity: Some(0),
            ..Default::default()
        };
        h.service.edit(&alice, batch.batch.id, patch).await.unwrap();

        let read = h.service.get(&alice, batch.batch.id).await.unwrap();
        assert_eq!(read.status, MaterialStatus::Low);
        assert_eq!(read.batch.intake_status, MaterialStatus::Normal);
        assert_eq!(read.batch.version, 2);
        assert_eq!(read.batch.expiry_date, in_days(100));
    }

    #[tokio::test]
    async fn issuing_a_missing_batch_writes_nothing() {
        let h = setup();

        let err = h
            .service
            .issue(&alice(), MaterialId::new(), IssueDetails::default())
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::NotFound);
        assert!(h.records().await.is_empty());
        assert!(h.journal.all().is_empty());
    }

    #[tokio::test]
    async fn issuing_an_empty_batch_is_rejected() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("As Standard", 0, in_days(200)))
            .await
            .unwrap();

        let err = h
            .service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(h.records().await.is_empty());
        assert_eq!(h.batches().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_issuances_write_at_most_one_record() {
        let h = setup();
        let alice = alice();
        let bob = Session::new(UserId::new(), "Bob", Role::Operator);
        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();
        h.materials.yield_after_get.store(true, Ordering::SeqCst);

        let (first, second) = tokio::join!(
            h.service.issue(&alice, batch.batch.id, IssueDetails::default()),
            h.service.issue(&bob, batch.batch.id, IssueDetails::default()),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(
            loser,
            ServiceError::Conflict { step: WorkflowStep::Journal, .. } | ServiceError::NotFound
        ));

        assert_eq!(h.records().await.len(), 1);
        assert!(h.batches().await.is_empty());
    }

    #[tokio::test]
    async fn failed_delete_is_partial_completion_and_reconcile_finishes_it() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();

        h.materials.fail_delete.store(true, Ordering::SeqCst);
        let err = h
            .service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap_err();

        let record_id = match err {
            ServiceError::PartialCompletion {
                step: WorkflowStep::Delete,
                material_id,
                record_id: Some(record_id),
                ..
            } => {
                assert_eq!(material_id, batch.batch.id);
                record_id
            }
            other => panic!("expected partial completion, got {other:?}"),
        };
        assert_eq!(h.records().await.len(), 1);
        assert_eq!(h.batches().await.len(), 1);

        // A second attempt must not duplicate the record.
        h.materials.fail_delete.store(false, Ordering::SeqCst);
        let retry = h
            .service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(retry, ServiceError::Conflict { step: WorkflowStep::Journal, .. }));
        assert_eq!(h.records().await.len(), 1);

        let report = h.service.reconcile_issuances(&admin()).await.unwrap();
        assert_eq!(report.committed.len(), 1);
        assert!(report.abandoned.is_empty());
        assert!(report.needs_review.is_empty());
        assert!(h.batches().await.is_empty());

        let records = h.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record_id);
        assert!(h.journal.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_record_leaves_batch_and_abandons_intent() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("Zn Standard", 2, in_days(90)))
            .await
            .unwrap();

        h.records.fail_append.store(true, Ordering::SeqCst);
        let err = h
            .service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Transport { step: WorkflowStep::Record, .. }));
        assert!(h.records().await.is_empty());
        assert_eq!(h.batches().await.len(), 1);
        assert_eq!(h.journal.all()[0].state, IntentState::Abandoned);

        // Nothing durable happened, so a later issue goes through.
        h.records.fail_append.store(false, Ordering::SeqCst);
        h.service
            .issue(&alice, batch.batch.id, IssueDetails::default())
            .await
            .unwrap();
        assert_eq!(h.records().await.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_abandons_intents_that_never_recorded() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("Cu Standard", 4, in_days(60)))
            .await
            .unwrap();
        let intent = h.journal.open(batch.batch.id, 1, alice.user_id).await.unwrap();

        let report = h.service.reconcile_issuances(&admin()).await.unwrap();

        assert_eq!(report.abandoned, vec![intent.id]);
        assert_eq!(h.batches().await.len(), 1);
        assert!(h.records().await.is_empty());
    }

    #[tokio::test]
    async fn reconcile_leaves_edited_batches_for_review() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("Ni Standard", 4, in_days(60)))
            .await
            .unwrap();

        let intent = h.journal.open(batch.batch.id, 1, alice.user_id).await.unwrap();
        let record = h
            .service
            .recorder()
            .record(
                MovementKind::Out,
                &batch.batch,
                Operator {
                    id: alice.user_id,
                    name: alice.name.clone(),
                },
                IssueDetails::default(),
            )
            .await
            .unwrap();
        h.journal.mark_recorded(intent.id, record.id).await.unwrap();

        let patch = MaterialPatch {
            quantity: Some(2),
            ..Default::default()
        };
        h.service.edit(&alice, batch.batch.id, patch).await.unwrap();

        let report = h.service.reconcile_issuances(&admin()).await.unwrap();
        assert_eq!(report.needs_review, vec![intent.id]);
        assert_eq!(h.batches().await.len(), 1);
        assert_eq!(h.journal.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_keeps_going_past_a_failing_intent_and_refreshes() {
        let h = setup();
        let alice = alice();
        let pb = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();
        let cd = h
            .service
            .register(&alice, draft("Cd Standard", 2, in_days(40)))
            .await
            .unwrap();

        // Pb: recorded but not removed.
        h.materials.fail_delete.store(true, Ordering::SeqCst);
        h.service
            .issue(&alice, pb.batch.id, IssueDetails::default())
            .await
            .unwrap_err();
        h.materials.fail_delete.store(false, Ordering::SeqCst);

        // Cd: an intent whose batch cannot be read during the pass.
        let cd_intent = h.journal.open(cd.batch.id, 1, alice.user_id).await.unwrap();
        *h.materials.fail_get_for.lock().unwrap() = Some(cd.batch.id);

        let listed = h.service.materials(&alice, &MaterialQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 2);

        let report = h.service.reconcile_issuances(&admin()).await.unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].intent_id, cd_intent.id);
        assert_eq!(report.failed[0].step, WorkflowStep::Fetch);

        let listed = h.service.materials(&alice, &MaterialQuery::default()).await.unwrap();
        let ids: Vec<MaterialId> = listed.iter().map(|v| v.batch.id).collect();
        assert_eq!(ids, vec![cd.batch.id]);
        assert_eq!(h.service.overview(&alice, None).await.unwrap().counts.total, 1);

        // The failed intent is still pending for the next pass.
        *h.materials.fail_get_for.lock().unwrap() = None;
        let report = h.service.reconcile_issuances(&admin()).await.unwrap();
        assert_eq!(report.abandoned, vec![cd_intent.id]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn listing_older_than_a_mutation_is_not_installed() {
        let h = setup();
        let alice = alice();
        let keep = h
            .service
            .register(&alice, draft("Cu Standard", 3, in_days(90)))
            .await
            .unwrap();
        let gone = h
            .service
            .register(&alice, draft("Zn Standard", 1, in_days(90)))
            .await
            .unwrap();

        // A slow refresh takes its listing, then a delete runs and refreshes before it finishes.
        let hold = h.materials.hold_next_list();
        let slow_refresh = h.service.refresh();
        let delete = async {
            hold.listed.notified().await;
            h.service.delete(&alice, gone.batch.id).await.unwrap();
            hold.release.notify_one();
        };
        let (old_listing, ()) = tokio::join!(slow_refresh, delete);
        assert_eq!(old_listing.unwrap().len(), 2);

        assert!(!h.service.is_stale());
        let listed = h.service.materials(&alice, &MaterialQuery::default()).await.unwrap();
        let ids: Vec<MaterialId> = listed.iter().map(|v| v.batch.id).collect();
        assert_eq!(ids, vec![keep.batch.id]);
        assert_eq!(h.service.overview(&alice, None).await.unwrap().counts.total, 1);
    }

    #[tokio::test]
    async fn operators_cannot_reconcile() {
        let h = setup();
        let err = h.service.reconcile_issuances(&alice()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn invalid_intake_touches_no_store() {
        let h = setup();
        let err = h
            .service
            .register(&alice(), draft("Pb Standard", -1, in_days(10)))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(h.batches().await.is_empty());

        let mut bad_date = draft("Pb Standard", 1, in_days(10));
        bad_date.expiry_date = "next spring".to_string();
        assert!(matches!(
            h.service.register(&alice(), bad_date).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(h.batches().await.is_empty());
    }

    #[tokio::test]
    async fn intake_audit_writes_inbound_record() {
        let h = setup_with(InventorySettings {
            intake_audit: IntakeAudit::Record,
            ..Default::default()
        });
        let alice = alice();

        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 7, in_days(40)))
            .await
            .unwrap();

        let records = h.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MovementKind::In);
        assert_eq!(records[0].quantity, 7);
        assert_eq!(records[0].material_id, batch.batch.id);
    }

    #[tokio::test]
    async fn intake_audit_failure_is_partial_completion() {
        let h = setup_with(InventorySettings {
            intake_audit: IntakeAudit::Record,
            ..Default::default()
        });
        h.records.fail_append.store(true, Ordering::SeqCst);

        let err = h
            .service
            .register(&alice(), draft("Pb Standard", 7, in_days(40)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::PartialCompletion {
                step: WorkflowStep::Record,
                record_id: None,
                ..
            }
        ));
        assert_eq!(h.batches().await.len(), 1);
    }

    #[tokio::test]
    async fn intake_without_audit_writes_no_record() {
        let h = setup();
        h.service
            .register(&alice(), draft("Pb Standard", 7, in_days(40)))
            .await
            .unwrap();
        assert!(h.records().await.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_mutation_and_marks_cache_stale() {
        let h = setup();
        let alice = alice();
        h.service.refresh().await.unwrap();
        assert!(!h.service.is_stale());

        h.materials.fail_list.store(true, Ordering::SeqCst);
        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();
        assert!(h.service.is_stale());
        assert_eq!(h.batches().await.len(), 1);

        h.materials.fail_list.store(false, Ordering::SeqCst);
        let listed = h.service.materials(&alice, &MaterialQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].batch.id, batch.batch.id);
        assert!(!h.service.is_stale());
    }

    #[tokio::test]
    async fn overview_groups_filtered_batches() {
        let h = setup();
        let alice = alice();
        for (name, qty, expiry) in [
            ("Pb Standard", 5, in_days(10)),
            ("Pb Standard", 2, in_days(300)),
            ("Cd Standard", 1, in_days(5)),
            ("Hg Standard", 3, days_ago(3)),
        ] {
            h.service.register(&alice, draft(name, qty, expiry)).await.unwrap();
        }

        let all = h.service.overview(&alice, None).await.unwrap();
        assert_eq!(all.counts.total, 4);
        let pb = all.groups.iter().find(|g| g.name == "Pb Standard").unwrap();
        assert_eq!(pb.total_quantity, 7);

        let warning = MaterialQuery {
            text: None,
            status: Some(MaterialStatus::Warning),
        };
        let filtered = h.service.overview(&alice, Some(&warning)).await.unwrap();
        let names: Vec<&str> = filtered.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Cd Standard", "Pb Standard"]);
        assert_eq!(filtered.counts.total, 2);

        let search = MaterialQuery {
            text: Some("hg".to_string()),
            status: None,
        };
        let found = h.service.materials(&alice, &search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, MaterialStatus::Expired);
    }

    #[tokio::test]
    async fn dashboard_shows_five_newest_records() {
        let h = setup();
        let alice = alice();
        for i in 0..7 {
            let batch = h
                .service
                .register(&alice, draft(&format!("Standard {i}"), 1, in_days(100)))
                .await
                .unwrap();
            h.service
                .issue(&alice, batch.batch.id, IssueDetails::default())
                .await
                .unwrap();
        }
        h.service
            .register(&alice, draft("Remaining", 2, in_days(100)))
            .await
            .unwrap();

        let dashboard = h.service.dashboard(&alice).await.unwrap();
        assert_eq!(dashboard.counts.total, 1);
        assert_eq!(dashboard.recent_records.len(), 5);
        assert_eq!(dashboard.recent_records[0].material_name, "Standard 6");

        let records = h
            .service
            .recorder()
            .list(&alice, &RecordQuery::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 7);
    }

    #[tokio::test]
    async fn issue_details_are_carried_into_the_record() {
        let h = setup();
        let alice = alice();
        let batch = h
            .service
            .register(&alice, draft("Pb Standard", 5, in_days(10)))
            .await
            .unwrap();

        let details = IssueDetails {
            purpose: Some("ICP-MS calibration".to_string()),
            note: None,
            images: vec!["photos/pb-1.jpg".to_string()],
            operator_name: Some("Dr. Chen".to_string()),
        };
        let issued = h.service.issue(&alice, batch.batch.id, details).await.unwrap();

        assert_eq!(issued.record.operator, "Dr. Chen");
        assert_eq!(issued.record.operator_id, alice.user_id);
        assert_eq!(issued.record.purpose.as_deref(), Some("ICP-MS calibration"));
        assert_eq!(issued.record.images.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_unique_ids_are_reported() {
        let h = setup();
        let alice = alice();
        h.service.register(&alice, draft("Pb Standard", 1, in_days(10))).await.unwrap();
        h.service.register(&alice, draft("Pb Standard", 2, in_days(20))).await.unwrap();
        h.service.register(&alice, draft("Cd Standard", 2, in_days(20))).await.unwrap();

        let duplicates = h.service.duplicate_unique_ids(&alice).await.unwrap();
        assert_eq!(duplicates.len(), 1);
    }
}
