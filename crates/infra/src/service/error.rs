use serde::Serialize;
use thiserror::Error;

use labstock_auth::AuthzError;
use labstock_core::{DomainError, MaterialId, RecordId};

use crate::store::StoreError;

/// Workflow step that failed. Carried by store-level failures so the caller
/// knows how far a multi-step workflow got.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Fetch,
    Journal,
    Create,
    Update,
    Record,
    Delete,
    List,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Fetch => "fetch",
            WorkflowStep::Journal => "journal",
            WorkflowStep::Create => "create",
            WorkflowStep::Update => "update",
            WorkflowStep::Record => "record",
            WorkflowStep::Delete => "delete",
            WorkflowStep::List => "list",
        }
    }
}

impl core::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict during {step}: {message}")]
    Conflict { step: WorkflowStep, message: String },

    #[error("store failure during {step}: {message}")]
    Transport { step: WorkflowStep, message: String },

    /// Some writes landed before `step` failed. Retrying blindly would
    /// duplicate them; the issuance journal or an operator has to finish the job.
    #[error("partial completion for batch {material_id}: {step} failed after earlier writes: {message}")]
    PartialCompletion {
        step: WorkflowStep,
        material_id: MaterialId,
        record_id: Option<RecordId>,
        message: String,
    },
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attribute a store failure to the workflow step it happened in.
    pub fn at(step: WorkflowStep, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict(message) => Self::Conflict { step, message },
            StoreError::Validation(message) => Self::Validation(message),
            StoreError::Transport(message) => Self::Transport { step, message },
        }
    }

    /// Short machine-readable code (used for API error bodies and logs).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict { .. } => "conflict",
            Self::Transport { .. } => "store_unavailable",
            Self::PartialCompletion { .. } => "partial_completion",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => Self::NotFound,
            DomainError::Unauthorized => Self::Forbidden("unauthorized".to_string()),
            DomainError::Validation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::Conflict(msg) => Self::Validation(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(permission) => Self::Forbidden(format!("missing permission '{permission}'")),
        }
    }
}
