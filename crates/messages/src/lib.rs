//! Internal notices between lab personnel (the `messages` entity).

pub mod message;

pub use message::{Message, MessageDraft, NewMessage, Recipient, unread_count};
