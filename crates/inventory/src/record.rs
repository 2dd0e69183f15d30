//! Movement records: the immutable audit trail of stock movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult, MaterialId, RecordId, UserId};

use crate::material::{MaterialBatch, validate_images};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            other => Err(DomainError::validation(format!(
                "record type must be 'in' or 'out' (got '{other}')"
            ))),
        }
    }
}

/// The person performing a movement, snapshotted into the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: UserId,
    pub name: String,
}

/// A stored movement record. Never mutated after creation.
///
/// `material_id` may dangle once the batch is gone; the record is historical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub material_id: MaterialId,
    pub material_name: String,
    pub quantity: u32,
    pub operator: String,
    pub operator_id: UserId,
    pub purpose: Option<String>,
    pub note: Option<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl MovementRecord {
    pub fn from_new(id: RecordId, new: NewMovement, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: new.kind,
            material_id: new.material_id,
            material_name: new.material_name,
            quantity: new.quantity,
            operator: new.operator.name,
            operator_id: new.operator.id,
            purpose: new.purpose,
            note: new.note,
            images: new.images,
            created_at,
        }
    }
}

/// Optional details captured with an outbound issuance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueDetails {
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Display name to record instead of the session's (e.g. issuing on behalf of a colleague).
    #[serde(default)]
    pub operator_name: Option<String>,
}

/// A movement record ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub material_id: MaterialId,
    pub material_name: String,
    pub quantity: u32,
    pub operator: Operator,
    pub purpose: Option<String>,
    pub note: Option<String>,
    pub images: Vec<String>,
}

impl NewMovement {
    /// Full-lot outbound record for `batch` (issuance empties the lot).
    pub fn outbound(batch: &MaterialBatch, operator: Operator, details: IssueDetails) -> DomainResult<Self> {
        let images = validate_images(details.images)?;
        let operator = match details.operator_name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => Operator { name, ..operator },
            _ => operator,
        };
        if operator.name.trim().is_empty() {
            return Err(DomainError::validation("operator name cannot be empty"));
        }

        Ok(Self {
            kind: MovementKind::Out,
            material_id: batch.id,
            material_name: batch.name.clone(),
            quantity: batch.quantity,
            operator,
            purpose: non_blank(details.purpose),
            note: non_blank(details.note),
            images,
        })
    }

    /// Inbound record mirroring a freshly registered batch.
    pub fn inbound(batch: &MaterialBatch, operator: Operator) -> Self {
        Self {
            kind: MovementKind::In,
            material_id: batch.id,
            material_name: batch.name.clone(),
            quantity: batch.quantity,
            operator,
            purpose: None,
            note: None,
            images: batch.images.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Filter for the records listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Case-insensitive match on material name, operator or note.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<MovementKind>,
}

impl RecordQuery {
    pub fn matches(&self, record: &MovementRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }

        let Some(needle) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();

        record.material_name.to_lowercase().contains(&needle)
            || record.operator.to_lowercase().contains(&needle)
            || record
                .note
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
    }

    /// Filter a newest-first listing, preserving order.
    pub fn apply(&self, records: &[MovementRecord]) -> Vec<MovementRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}
