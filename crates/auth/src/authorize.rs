use thiserror::Error;

use crate::{Permission, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check a session against a required permission.
///
/// Pure policy check: no IO, no business logic.
pub fn authorize(session: &Session, required: &Permission) -> Result<(), AuthzError> {
    let granted = Permission::granted_to(session.role);

    if granted
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str())
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
