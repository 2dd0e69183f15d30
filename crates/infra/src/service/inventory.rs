//! Inventory Service: the orchestration workflows over batches.
//!
//! Every mutation follows the same shape: authorize, validate, write through
//! the stores, publish an [`InventoryChanged`] notice, then refresh the cached
//! batch list. The store is the source of truth; the cache only saves a
//! round-trip for reads and is re-listed whenever it is stale.

use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::Serialize;

use labstock_auth::{Permission, Session, authorize};
use labstock_core::{Clock, ExpectedVersion, IntentId, MaterialId};
use labstock_events::{EventBus, InMemoryEventBus, Subscription};
use labstock_inventory::{
    Dashboard, InventoryChanged, InventoryOverview, IssueDetails, MaterialBatch, MaterialDraft,
    MaterialPatch, MaterialQuery, MaterialView, MovementKind, MovementRecord, NewMovement,
    Operator, StatusPolicy, duplicate_unique_ids,
};

use super::error::{ServiceError, WorkflowStep};
use super::recorder::TransactionRecorder;
use crate::config::IntakeAudit;
use crate::store::{IssuanceIntent, IssuanceJournal, MaterialRepository, StoreError};

/// Tunables for [`InventoryService`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventorySettings {
    pub policy: StatusPolicy,
    pub intake_audit: IntakeAudit,
}

/// Result of a completed issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issuance {
    pub intent_id: IntentId,
    pub record: MovementRecord,
}

/// What a reconciliation pass did with each pending intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Intents whose batch removal was finished (or found already done).
    pub committed: Vec<IntentId>,
    /// Intents with no durable effect, closed without changes.
    pub abandoned: Vec<IntentId>,
    /// Intents whose batch changed since the record was written; left pending for a person.
    pub needs_review: Vec<IntentId>,
    /// Intents the pass could not look at or close; still pending.
    pub failed: Vec<ReconcileFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileFailure {
    pub intent_id: IntentId,
    pub step: WorkflowStep,
    pub message: String,
}

/// How a single pending intent was settled.
enum Settled {
    Committed { removed: bool },
    Abandoned,
    NeedsReview,
}

#[derive(Default)]
struct Cache {
    batches: Vec<MaterialBatch>,
    overview: Option<InventoryOverview>,
    stale: bool,
    loaded: bool,
    /// Bumped by every mutation; a listing taken under an older generation is discarded.
    generation: u64,
}

pub struct InventoryService {
    materials: Arc<dyn MaterialRepository>,
    recorder: TransactionRecorder,
    journal: Arc<dyn IssuanceJournal>,
    clock: Arc<dyn Clock>,
    changes: Arc<InMemoryEventBus<InventoryChanged>>,
    settings: InventorySettings,
    cache: RwLock<Cache>,
}

impl InventoryService {
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        recorder: TransactionRecorder,
        journal: Arc<dyn IssuanceJournal>,
        clock: Arc<dyn Clock>,
        settings: InventorySettings,
    ) -> Self {
        Self {
            materials,
            recorder,
            journal,
            clock,
            changes: Arc::new(InMemoryEventBus::new()),
            settings,
            cache: RwLock::new(Cache::default()),
        }
    }

    pub fn recorder(&self) -> &TransactionRecorder {
        &self.recorder
    }

    pub fn settings(&self) -> InventorySettings {
        self.settings
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Notifications for every successful mutation.
    pub fn subscribe(&self) -> Subscription<InventoryChanged> {
        self.changes.subscribe()
    }

    /// Whether the cached list needs a re-list before it can be served.
    pub fn is_stale(&self) -> bool {
        self.cache.read().map(|c| c.stale || !c.loaded).unwrap_or(true)
    }

    // ---- reads ----

    /// Re-list the store and replace the cached batch list and overview.
    ///
    /// A listing that raced with a mutation is returned but not installed.
    pub async fn refresh(&self) -> Result<Vec<MaterialBatch>, ServiceError> {
        let generation = self.cache.read().map(|c| c.generation).unwrap_or(0);
        let batches = self
            .materials
            .list()
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::List, e))?;

        let overview = InventoryOverview::build(&batches, self.today(), &self.settings.policy);
        if let Ok(mut cache) = self.cache.write() {
            if cache.generation == generation {
                cache.batches = batches.clone();
                cache.overview = Some(overview);
                cache.stale = false;
                cache.loaded = true;
            } else {
                tracing::debug!(listed = generation, current = cache.generation, "discarding listing older than the last mutation");
            }
        }
        Ok(batches)
    }

    /// Current batch set, newest first (cached unless stale).
    async fn batches(&self) -> Result<Vec<MaterialBatch>, ServiceError> {
        if !self.is_stale() {
            if let Ok(cache) = self.cache.read() {
                return Ok(cache.batches.clone());
            }
        }
        self.refresh().await
    }

    /// Batches matching `query`, newest first, each with today's status.
    pub async fn materials(&self, session: &Session, query: &MaterialQuery) -> Result<Vec<MaterialView>, ServiceError> {
        authorize(session, &Permission::MATERIALS_READ)?;
        let today = self.today();
        let policy = self.settings.policy;
        Ok(query
            .apply(&self.batches().await?, today, &policy)
            .into_iter()
            .map(|b| MaterialView::new(b, today, &policy))
            .collect())
    }

    pub async fn get(&self, session: &Session, id: MaterialId) -> Result<MaterialView, ServiceError> {
        authorize(session, &Permission::MATERIALS_READ)?;
        let batch = self
            .materials
            .get(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Fetch, e))?;
        Ok(MaterialView::new(batch, self.today(), &self.settings.policy))
    }

    /// Aggregation View. With a query, grouping runs over the filtered set.
    pub async fn overview(
        &self,
        session: &Session,
        query: Option<&MaterialQuery>,
    ) -> Result<InventoryOverview, ServiceError> {
        authorize(session, &Permission::MATERIALS_READ)?;
        let today = self.today();
        let policy = self.settings.policy;

        if query.is_none() && !self.is_stale() {
            if let Ok(cache) = self.cache.read() {
                if let Some(overview) = cache.overview.as_ref().filter(|o| o.as_of == today) {
                    return Ok(overview.clone());
                }
            }
        }

        let batches = self.batches().await?;
        let batches = match query {
            Some(q) => q.apply(&batches, today, &policy),
            None => batches,
        };
        Ok(InventoryOverview::build(&batches, today, &policy))
    }

    pub async fn dashboard(&self, session: &Session) -> Result<Dashboard, ServiceError> {
        authorize(session, &Permission::MATERIALS_READ)?;
        let batches = self.batches().await?;
        let records = self.recorder.all().await?;
        Ok(Dashboard::build(&batches, &records, self.today(), &self.settings.policy))
    }

    /// `unique_id`s shared by more than one batch (case-insensitive).
    pub async fn duplicate_unique_ids(&self, session: &Session) -> Result<Vec<String>, ServiceError> {
        authorize(session, &Permission::MATERIALS_READ)?;
        let batches = self.batches().await?;
        Ok(duplicate_unique_ids(&batches).into_keys().collect())
    }

    // ---- mutations ----

    /// Register a new batch (intake).
    pub async fn register(&self, session: &Session, draft: MaterialDraft) -> Result<MaterialView, ServiceError> {
        authorize(session, &Permission::MATERIALS_WRITE)?;
        let today = self.today();
        let policy = self.settings.policy;
        let new = draft.validate(session.user_id, &policy, today)?;

        let batch = self
            .materials
            .create(new)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Create, e))?;
        tracing::info!(material_id = %batch.id, name = %batch.name, quantity = batch.quantity, by = %session.user_id, "batch registered");

        let audited = match self.settings.intake_audit {
            IntakeAudit::Disabled => Ok(()),
            IntakeAudit::Record => self
                .recorder
                .append(NewMovement::inbound(&batch, operator(session)))
                .await
                .map(|_| ()),
        };

        self.publish(InventoryChanged::BatchRegistered {
            material_id: batch.id,
            by: session.user_id,
            at: self.clock.now(),
        });
        self.refresh_after_mutation().await;

        if let Err(err) = audited {
            tracing::warn!(material_id = %batch.id, error = %err, "batch registered but inbound record failed");
            return Err(ServiceError::PartialCompletion {
                step: WorkflowStep::Record,
                material_id: batch.id,
                record_id: None,
                message: err.to_string(),
            });
        }

        Ok(MaterialView::new(batch, today, &policy))
    }

    /// Apply an edit. Status is re-derived from the edited quantity/expiry.
    pub async fn edit(
        &self,
        session: &Session,
        id: MaterialId,
        patch: MaterialPatch,
    ) -> Result<MaterialView, ServiceError> {
        authorize(session, &Permission::MATERIALS_WRITE)?;
        let changes = patch.validate()?;

        let batch = self
            .materials
            .update(id, changes)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Update, e))?;
        tracing::info!(material_id = %batch.id, version = batch.version, by = %session.user_id, "batch edited");

        self.publish(InventoryChanged::BatchEdited {
            material_id: batch.id,
            by: session.user_id,
            at: self.clock.now(),
        });
        self.refresh_after_mutation().await;

        Ok(MaterialView::new(batch, self.today(), &self.settings.policy))
    }

    /// Remove a batch without recording a movement (data correction).
    pub async fn delete(&self, session: &Session, id: MaterialId) -> Result<(), ServiceError> {
        authorize(session, &Permission::MATERIALS_DELETE)?;
        self.materials
            .delete(id, ExpectedVersion::Any)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Delete, e))?;
        tracing::info!(material_id = %id, by = %session.user_id, "batch deleted");

        self.publish(InventoryChanged::BatchDeleted {
            material_id: id,
            by: session.user_id,
            at: self.clock.now(),
        });
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Issue the whole lot: fetch, journal, record `out`, conditionally delete.
    ///
    /// Failures before the record leave nothing behind. A failure after the
    /// record is a [`ServiceError::PartialCompletion`]; the intent stays in
    /// the journal for [`InventoryService::reconcile_issuances`].
    pub async fn issue(
        &self,
        session: &Session,
        id: MaterialId,
        details: IssueDetails,
    ) -> Result<Issuance, ServiceError> {
        authorize(session, &Permission::MATERIALS_ISSUE)?;

        let batch = self
            .materials
            .get(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Fetch, e))?;
        if batch.quantity == 0 {
            return Err(ServiceError::validation("batch has no stock left to issue"));
        }
        let movement = NewMovement::outbound(&batch, operator(session), details)?;

        let intent = self
            .journal
            .open(batch.id, batch.version, session.user_id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Journal, e))?;

        let record = match self.recorder.append(movement).await {
            Ok(record) => record,
            Err(err) => {
                self.abandon(&intent).await;
                return Err(err);
            }
        };

        if let Err(e) = self.journal.mark_recorded(intent.id, record.id).await {
            // Reconciliation finds the record by material id, so this is not fatal.
            tracing::warn!(intent_id = %intent.id, record_id = %record.id, error = %e, "failed to mark issuance intent recorded");
        }

        if let Err(e) = self
            .materials
            .delete(batch.id, ExpectedVersion::Exact(batch.version))
            .await
        {
            tracing::warn!(
                material_id = %batch.id,
                record_id = %record.id,
                intent_id = %intent.id,
                error = %e,
                "outbound record written but batch was not removed"
            );
            self.refresh_after_mutation().await;
            return Err(ServiceError::PartialCompletion {
                step: WorkflowStep::Delete,
                material_id: batch.id,
                record_id: Some(record.id),
                message: e.to_string(),
            });
        }

        if let Err(e) = self.journal.commit(intent.id).await {
            tracing::warn!(intent_id = %intent.id, error = %e, "batch issued but intent not committed");
        }
        tracing::info!(material_id = %batch.id, record_id = %record.id, quantity = record.quantity, operator = %record.operator, "batch issued");

        self.publish(InventoryChanged::BatchIssued {
            material_id: batch.id,
            record_id: record.id,
            by: session.user_id,
            at: self.clock.now(),
        });
        self.refresh_after_mutation().await;

        Ok(Issuance {
            intent_id: intent.id,
            record,
        })
    }

    /// Finish or close every pending issuance intent. Admins only.
    ///
    /// * batch gone: commit if an outbound record exists, otherwise abandon;
    /// * batch present, no record: abandon (nothing durable happened);
    /// * batch present, record written, version unchanged: delete, then commit;
    /// * batch present, record written, version moved: leave for review.
    pub async fn reconcile_issuances(&self, session: &Session) -> Result<ReconcileReport, ServiceError> {
        authorize(session, &Permission::INVENTORY_RECONCILE)?;

        let pending = self
            .journal
            .pending()
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Journal, e))?;

        let mut report = ReconcileReport::default();
        let mut removed_any = false;

        for intent in pending {
            match self.settle(session, &intent).await {
                Ok(Settled::Committed { removed }) => {
                    removed_any |= removed;
                    report.committed.push(intent.id);
                }
                Ok(Settled::Abandoned) => report.abandoned.push(intent.id),
                Ok(Settled::NeedsReview) => report.needs_review.push(intent.id),
                Err(err) => {
                    tracing::warn!(intent_id = %intent.id, material_id = %intent.material_id, error = %err, "could not reconcile issuance intent");
                    report.failed.push(ReconcileFailure {
                        intent_id: intent.id,
                        step: failed_step(&err),
                        message: err.to_string(),
                    });
                }
            }
        }

        if removed_any {
            self.refresh_after_mutation().await;
        }
        tracing::info!(
            committed = report.committed.len(),
            abandoned = report.abandoned.len(),
            needs_review = report.needs_review.len(),
            failed = report.failed.len(),
            "issuance reconciliation finished"
        );
        Ok(report)
    }

    // ---- helpers ----

    async fn settle(&self, session: &Session, intent: &IssuanceIntent) -> Result<Settled, ServiceError> {
        let record = self.recorded_outbound(intent).await?;
        let batch = match self.materials.get(intent.material_id).await {
            Ok(batch) => Some(batch),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(ServiceError::at(WorkflowStep::Fetch, e)),
        };

        match (batch, record) {
            (None, Some(_)) => {
                self.close(intent, true).await?;
                Ok(Settled::Committed { removed: false })
            }
            (_, None) => {
                self.close(intent, false).await?;
                Ok(Settled::Abandoned)
            }
            (Some(batch), Some(record)) if batch.version == intent.material_version => {
                match self
                    .materials
                    .delete(batch.id, ExpectedVersion::Exact(intent.material_version))
                    .await
                {
                    Ok(()) | Err(StoreError::NotFound) => {}
                    Err(StoreError::Conflict(_)) => return Ok(Settled::NeedsReview),
                    Err(e) => return Err(ServiceError::at(WorkflowStep::Delete, e)),
                }
                tracing::info!(intent_id = %intent.id, material_id = %batch.id, record_id = %record.id, "interrupted issuance completed");
                self.publish(InventoryChanged::BatchIssued {
                    material_id: batch.id,
                    record_id: record.id,
                    by: session.user_id,
                    at: self.clock.now(),
                });
                // Batch already removed: refresh even when closing the intent fails.
                if let Err(e) = self.close(intent, true).await {
                    self.refresh_after_mutation().await;
                    return Err(e);
                }
                Ok(Settled::Committed { removed: true })
            }
            (Some(batch), Some(record)) => {
                tracing::warn!(
                    intent_id = %intent.id,
                    material_id = %batch.id,
                    record_id = %record.id,
                    expected_version = intent.material_version,
                    actual_version = batch.version,
                    "batch changed after outbound record; needs review"
                );
                Ok(Settled::NeedsReview)
            }
        }
    }

    /// The outbound record an intent produced, if any.
    async fn recorded_outbound(&self, intent: &IssuanceIntent) -> Result<Option<MovementRecord>, ServiceError> {
        let records = self.recorder.for_material(intent.material_id).await?;
        let found = records.into_iter().find(|r| match intent.record_id {
            Some(id) => r.id == id,
            None => r.kind == MovementKind::Out && r.created_at >= intent.opened_at,
        });
        Ok(found)
    }

    async fn close(&self, intent: &IssuanceIntent, committed: bool) -> Result<(), ServiceError> {
        let result = if committed {
            self.journal.commit(intent.id).await
        } else {
            self.journal.abandon(intent.id).await
        };
        result.map_err(|e| ServiceError::at(WorkflowStep::Journal, e))
    }

    async fn abandon(&self, intent: &IssuanceIntent) {
        if let Err(e) = self.journal.abandon(intent.id).await {
            tracing::warn!(intent_id = %intent.id, error = %e, "failed to abandon issuance intent");
        }
    }

    fn publish(&self, change: InventoryChanged) {
        if let Err(e) = self.changes.publish(change) {
            tracing::warn!(error = ?e, "failed to publish inventory change");
        }
    }

    /// Re-list after a write. Never fails the write itself.
    async fn refresh_after_mutation(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.generation += 1;
            cache.stale = true;
        }
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after mutation failed; cache marked stale");
            if let Ok(mut cache) = self.cache.write() {
                cache.stale = true;
            }
        }
    }
}

fn failed_step(err: &ServiceError) -> WorkflowStep {
    match err {
        ServiceError::Conflict { step, .. }
        | ServiceError::Transport { step, .. }
        | ServiceError::PartialCompletion { step, .. } => *step,
        _ => WorkflowStep::Journal,
    }
}

fn operator(session: &Session) -> Operator {
    Operator {
        id: session.user_id,
        name: session.name.clone(),
    }
}
