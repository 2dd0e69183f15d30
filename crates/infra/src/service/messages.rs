use std::sync::Arc;

use serde::Serialize;

use labstock_auth::{Permission, Session, authorize};
use labstock_core::MessageId;
use labstock_messages::{Message, MessageDraft, unread_count};

use super::error::{ServiceError, WorkflowStep};
use crate::store::MessageStore;

/// A user's view of their messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inbox {
    pub unread: usize,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub async fn send(&self, session: &Session, draft: MessageDraft) -> Result<Message, ServiceError> {
        authorize(session, &Permission::MESSAGES_USE)?;
        let new = draft.validate(session.user_id, &session.name)?;
        let message = self
            .store
            .insert(new)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Create, e))?;
        tracing::info!(message_id = %message.id, from = %message.sender_id, to = %String::from(message.recipient), "message sent");
        Ok(message)
    }

    /// Messages addressed to the session user or to everyone, newest first.
    pub async fn inbox(&self, session: &Session) -> Result<Inbox, ServiceError> {
        authorize(session, &Permission::MESSAGES_USE)?;
        let messages = self
            .store
            .list_for(session.user_id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::List, e))?;
        Ok(Inbox {
            unread: unread_count(&messages, session.user_id),
            messages,
        })
    }

    pub async fn unread_count(&self, session: &Session) -> Result<usize, ServiceError> {
        Ok(self.inbox(session).await?.unread)
    }

    /// Idempotent: marking an already-read message again changes nothing.
    pub async fn mark_as_read(&self, session: &Session, id: MessageId) -> Result<Message, ServiceError> {
        authorize(session, &Permission::MESSAGES_USE)?;
        let message = self.fetch(id).await?;
        if !message.recipient.includes(session.user_id) {
            return Err(ServiceError::Forbidden("message is not addressed to you".to_string()));
        }
        if message.is_read_by(session.user_id) {
            return Ok(message);
        }
        self.store
            .mark_read(id, session.user_id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Update, e))
    }

    /// Senders delete their own messages; admins delete any.
    pub async fn delete(&self, session: &Session, id: MessageId) -> Result<(), ServiceError> {
        authorize(session, &Permission::MESSAGES_USE)?;
        let message = self.fetch(id).await?;
        if message.sender_id != session.user_id && !session.is_admin() {
            return Err(ServiceError::Forbidden("only the sender or an admin may delete a message".to_string()));
        }
        self.store
            .delete(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Delete, e))?;
        tracing::info!(message_id = %id, by = %session.user_id, "message deleted");
        Ok(())
    }

    async fn fetch(&self, id: MessageId) -> Result<Message, ServiceError> {
        self.store
            .get(id)
            .await
            .map_err(|e| ServiceError::at(WorkflowStep::Fetch, e))
    }
}
