use axum::http::StatusCode;
use serde::Deserialize;

use labstock_inventory::{IssueDetails, MaterialQuery, MaterialStatus, MovementKind, RecordQuery};

use crate::app::errors;

// -------------------------
// Query parameters
// -------------------------

/// `?q=...&status=...` on material listings.
#[derive(Debug, Default, Deserialize)]
pub struct MaterialListParams {
    pub q: Option<String>,
    pub status: Option<String>,
}

impl MaterialListParams {
    pub fn into_query(self) -> Result<MaterialQuery, axum::response::Response> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(raw.parse::<MaterialStatus>().map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "status must be one of: normal, warning, expired, low",
                )
            })?),
            None => None,
        };
        Ok(MaterialQuery { text: self.q, status })
    }

    pub fn is_empty(&self) -> bool {
        self.q.as_deref().is_none_or(|q| q.trim().is_empty())
            && self.status.as_deref().is_none_or(|s| s.trim().is_empty() || s == "all")
    }
}

/// `?q=...&type=in|out` on the records listing.
#[derive(Debug, Default, Deserialize)]
pub struct RecordListParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl RecordListParams {
    pub fn into_query(self) -> Result<RecordQuery, axum::response::Response> {
        let kind = match self.kind.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(raw.parse::<MovementKind>().map_err(|_| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_type",
                    "type must be 'in' or 'out'",
                )
            })?),
            None => None,
        };
        Ok(RecordQuery { text: self.q, kind })
    }
}

// -------------------------
// Request bodies
// -------------------------

/// Body of `POST /materials/:id/issue`. Empty means no details; anything else
/// must be a valid `IssueDetails` document, otherwise nothing is issued.
pub fn issue_details(body: &[u8]) -> Result<IssueDetails, axum::response::Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(IssueDetails::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid issue details: {e}"),
        )
    })
}
