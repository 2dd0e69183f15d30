//! `labstock-core`: shared building blocks for the reference-material stock domain.
//!
//! This crate contains **pure** primitives (no IO, no storage concerns).

pub mod clock;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{IntentId, MaterialId, MessageId, RecordId, UserId};
pub use version::{ExpectedVersion, Versioned};
