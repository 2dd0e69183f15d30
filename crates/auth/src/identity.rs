//! Identity provider boundary.
//!
//! The real provider is an external service. The trait captures the handful of
//! calls the application makes; [`InMemoryIdentityProvider`] backs tests and
//! local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use labstock_core::UserId;
use labstock_events::{Event, EventBus, InMemoryEventBus, Subscription};

use crate::{Person, Role, Session};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for '{0}'")]
    EmailTaken(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Emitted whenever the current session starts or ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn { session: Session, at: DateTime<Utc> },
    SignedOut { user_id: UserId, at: DateTime<Utc> },
}

impl Event for SessionChange {
    fn event_type(&self) -> &'static str {
        match self {
            SessionChange::SignedIn { .. } => "identity.session.signed_in",
            SessionChange::SignedOut { .. } => "identity.session.signed_out",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SessionChange::SignedIn { at, .. } | SessionChange::SignedOut { at, .. } => *at,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Create an account and its profile. Does not start a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<Person, IdentityError>;

    async fn current_session(&self) -> Option<Session>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Subscribe to sign-in / sign-out notifications.
    fn on_session_change(&self) -> Subscription<SessionChange>;

    /// Everyone with a profile, newest first.
    async fn list_people(&self) -> Result<Vec<Person>, IdentityError>;
}

struct Account {
    person: Person,
    password: String,
}

/// Process-local identity provider (tests/dev only; credentials live in memory).
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    changes: InMemoryEventBus<SessionChange>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            changes: InMemoryEventBus::new(),
        }
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_ascii_lowercase()
    }

    fn poisoned() -> IdentityError {
        IdentityError::Provider("lock poisoned".to_string())
    }

    fn notify(&self, change: SessionChange) {
        if let Err(e) = self.changes.publish(change) {
            tracing::warn!(error = ?e, "failed to publish session change");
        }
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = Self::normalize_email(email);
        let session = {
            let accounts = self.accounts.read().map_err(|_| Self::poisoned())?;
            let account = accounts.get(&email).ok_or(IdentityError::InvalidCredentials)?;
            if account.password != password {
                return Err(IdentityError::InvalidCredentials);
            }
            Session::from(&account.person)
        };

        *self.current.write().map_err(|_| Self::poisoned())? = Some(session.clone());
        tracing::info!(user_id = %session.user_id, role = %session.role, "signed in");
        self.notify(SessionChange::SignedIn {
            session: session.clone(),
            at: Utc::now(),
        });
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<Person, IdentityError> {
        let email = Self::normalize_email(email);
        if !email.contains('@') {
            return Err(IdentityError::Validation("email is malformed".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if name.trim().is_empty() {
            return Err(IdentityError::Validation("name cannot be empty".to_string()));
        }

        let mut accounts = self.accounts.write().map_err(|_| Self::poisoned())?;
        if accounts.contains_key(&email) {
            return Err(IdentityError::EmailTaken(email));
        }

        let now = Utc::now();
        let person = Person {
            id: UserId::new(),
            email: email.clone(),
            name: name.trim().to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(
            email,
            Account {
                person: person.clone(),
                password: password.to_string(),
            },
        );
        Ok(person)
    }

    async fn current_session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let previous = self.current.write().map_err(|_| Self::poisoned())?.take();
        if let Some(session) = previous {
            self.notify(SessionChange::SignedOut {
                user_id: session.user_id,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    fn on_session_change(&self) -> Subscription<SessionChange> {
        self.changes.subscribe()
    }

    async fn list_people(&self) -> Result<Vec<Person>, IdentityError> {
        let accounts = self.accounts.read().map_err(|_| Self::poisoned())?;
        let mut people: Vec<Person> = accounts.values().map(|a| a.person.clone()).collect();
        people.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(people)
    }
}
