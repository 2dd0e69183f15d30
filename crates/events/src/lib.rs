//! In-process notifications: the `Event` trait and a small pub/sub bus.
//!
//! Used for session-change callbacks and for telling read-side consumers that
//! the batch set changed and derived views must be recomputed.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
