use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::UserId;

use crate::Role;

/// A person known to the identity provider (the `users` entity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated actor passed into every workflow.
///
/// Workflows copy `user_id`/`name` into provenance and operator fields; they
/// never look the person up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            name: name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&Person> for Session {
    fn from(person: &Person) -> Self {
        Self {
            user_id: person.id,
            name: person.name.clone(),
            role: person.role,
        }
    }
}
