use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures the pure domain crates can report.
///
/// Storage and transport problems never show up here; the infra layer has
/// its own error types and converts into these only at the workflow edge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Operator input rejected (blank required field, bad date, too many images).
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Stale version or a competing operation on the same batch.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(raw: impl Into<String>) -> Self {
        Self::InvalidId(raw.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// `"<field> is required"`, the message every blank required field gets.
    pub fn required(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
