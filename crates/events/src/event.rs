use chrono::{DateTime, Utc};

/// A notification describing something that already happened.
///
/// Events are facts: immutable and cheap to clone to every subscriber.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "inventory.batch.issued").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
