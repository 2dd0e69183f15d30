//! Reference-material inventory domain.
//!
//! Business rules only (no IO, no HTTP, no storage): batch validation, status
//! classification, movement records and the aggregation view.

pub mod events;
pub mod material;
pub mod overview;
pub mod query;
pub mod record;
pub mod status;

pub use events::InventoryChanged;
pub use material::{
    MAX_IMAGES, MAX_QUANTITY, MaterialBatch, MaterialChanges, MaterialDraft, MaterialPatch, MaterialView,
    NewMaterial, parse_expiry_date,
};
pub use overview::{
    Dashboard, InventoryOverview, MaterialGroup, RECENT_RECORDS, StatusCounts,
    compute_status_counts, duplicate_unique_ids, group_by_name,
};
pub use query::MaterialQuery;
pub use record::{IssueDetails, MovementKind, MovementRecord, NewMovement, Operator, RecordQuery};
pub use status::{DEFAULT_WARNING_WINDOW_DAYS, MaterialStatus, StatusPolicy, classify};
