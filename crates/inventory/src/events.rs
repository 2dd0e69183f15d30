use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{MaterialId, RecordId, UserId};
use labstock_events::Event;

/// Published after every successful change to the batch set.
///
/// Consumers treat it as "re-read and recompute"; the payload is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryChanged {
    BatchRegistered {
        material_id: MaterialId,
        by: UserId,
        at: DateTime<Utc>,
    },
    BatchEdited {
        material_id: MaterialId,
        by: UserId,
        at: DateTime<Utc>,
    },
    BatchDeleted {
        material_id: MaterialId,
        by: UserId,
        at: DateTime<Utc>,
    },
    BatchIssued {
        material_id: MaterialId,
        record_id: RecordId,
        by: UserId,
        at: DateTime<Utc>,
    },
}

impl InventoryChanged {
    pub fn material_id(&self) -> MaterialId {
        match self {
            InventoryChanged::BatchRegistered { material_id, .. }
            | InventoryChanged::BatchEdited { material_id, .. }
            | InventoryChanged::BatchDeleted { material_id, .. }
            | InventoryChanged::BatchIssued { material_id, .. } => *material_id,
        }
    }
}

impl Event for InventoryChanged {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryChanged::BatchRegistered { .. } => "inventory.batch.registered",
            InventoryChanged::BatchEdited { .. } => "inventory.batch.edited",
            InventoryChanged::BatchDeleted { .. } => "inventory.batch.deleted",
            InventoryChanged::BatchIssued { .. } => "inventory.batch.issued",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryChanged::BatchRegistered { at, .. }
            | InventoryChanged::BatchEdited { at, .. }
            | InventoryChanged::BatchDeleted { at, .. }
            | InventoryChanged::BatchIssued { at, .. } => *at,
        }
    }
}
