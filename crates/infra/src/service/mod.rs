//! Workflows over the stores: inventory orchestration, the movement log, messages.

pub mod error;
pub mod inventory;
pub mod messages;
pub mod recorder;

pub use error::{ServiceError, WorkflowStep};
pub use inventory::{InventoryService, InventorySettings, Issuance, ReconcileFailure, ReconcileReport};
pub use messages::{Inbox, MessageService};
pub use recorder::TransactionRecorder;
