use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult, MessageId, UserId};

const BROADCAST: &str = "all";

/// Who a message is addressed to. Serialized as a user id or `"all"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recipient {
    All,
    User(UserId),
}

impl Recipient {
    pub fn includes(&self, user: UserId) -> bool {
        match self {
            Recipient::All => true,
            Recipient::User(id) => *id == user,
        }
    }
}

impl TryFrom<String> for Recipient {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case(BROADCAST) {
            return Ok(Recipient::All);
        }
        Ok(Recipient::User(value.trim().parse()?))
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        match value {
            Recipient::All => BROADCAST.to_string(),
            Recipient::User(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub recipient: Recipient,
    pub recipient_name: String,
    pub subject: Option<String>,
    pub content: String,
    /// Users who have read the message; each at most once.
    pub read_by: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_new(id: MessageId, new: NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            recipient: new.recipient,
            recipient_name: new.recipient_name,
            subject: new.subject,
            content: new.content,
            read_by: Vec::new(),
            created_at,
        }
    }

    pub fn is_read_by(&self, user: UserId) -> bool {
        self.read_by.contains(&user)
    }

    /// Record that `user` read the message. Returns false if already recorded.
    pub fn mark_read(&mut self, user: UserId) -> bool {
        if self.is_read_by(user) {
            return false;
        }
        self.read_by.push(user);
        true
    }
}

/// Raw compose input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub recipient: Recipient,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub sender_name: String,
    pub recipient: Recipient,
    pub recipient_name: String,
    pub subject: Option<String>,
    pub content: String,
}

impl MessageDraft {
    pub fn validate(self, sender_id: UserId, sender_name: &str) -> DomainResult<NewMessage> {
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(DomainError::validation("message content cannot be empty"));
        }

        let recipient_name = match (self.recipient, self.recipient_name) {
            (_, Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
            (Recipient::All, _) => "all".to_string(),
            (Recipient::User(_), _) => {
                return Err(DomainError::validation("recipient_name is required for direct messages"));
            }
        };

        Ok(NewMessage {
            sender_id,
            sender_name: sender_name.to_string(),
            recipient: self.recipient,
            recipient_name,
            subject: self
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            content,
        })
    }
}

/// Messages addressed to `user` that they have not read yet.
pub fn unread_count(messages: &[Message], user: UserId) -> usize {
    messages
        .iter()
        .filter(|m| m.recipient.includes(user) && !m.is_read_by(user))
        .count()
}
