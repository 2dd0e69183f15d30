//! Material batches: one received lot of a reference material.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult, MaterialId, UserId, Versioned};

use crate::status::{MaterialStatus, StatusPolicy};

/// Maximum number of image references attached to a batch or a movement.
pub const MAX_IMAGES: usize = 3;

/// A material batch as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialBatch {
    pub id: MaterialId,
    pub name: String,
    pub code: String,
    pub batch_number: Option<String>,
    /// Batch + sequence identifier used for search and dedup (not enforced unique).
    pub unique_id: String,
    pub manufacturer: Option<String>,
    pub concentration: Option<String>,
    pub uncertainty: Option<String>,
    pub storage_condition: Option<String>,
    /// Discrete containers/vials on hand.
    pub quantity: u32,
    pub expiry_date: NaiveDate,
    /// Status computed at intake. Historical only; read paths call [`MaterialBatch::status_on`].
    pub intake_status: MaterialStatus,
    pub images: Vec<String>,
    pub created_by: UserId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialBatch {
    /// Derived status for a given day.
    pub fn status_on(&self, today: NaiveDate, policy: &StatusPolicy) -> MaterialStatus {
        policy.classify(self.quantity, self.expiry_date, today)
    }

    /// Build the stored row for a validated draft.
    ///
    /// Stores call this after assigning identity and timestamps.
    pub fn from_new(id: MaterialId, new: NewMaterial, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            code: new.code,
            batch_number: new.batch_number,
            unique_id: new.unique_id,
            manufacturer: new.manufacturer,
            concentration: new.concentration,
            uncertainty: new.uncertainty,
            storage_condition: new.storage_condition,
            quantity: new.quantity,
            expiry_date: new.expiry_date,
            intake_status: new.intake_status,
            images: new.images,
            created_by: new.created_by,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Versioned for MaterialBatch {
    fn version(&self) -> u64 {
        self.version
    }
}

/// A batch paired with its status for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub batch: MaterialBatch,
    pub status: MaterialStatus,
}

impl MaterialView {
    pub fn new(batch: MaterialBatch, today: NaiveDate, policy: &StatusPolicy) -> Self {
        let status = batch.status_on(today, policy);
        Self { batch, status }
    }
}

/// Raw intake input, as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialDraft {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub batch_number: Option<String>,
    pub unique_id: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub concentration: Option<String>,
    #[serde(default)]
    pub uncertainty: Option<String>,
    #[serde(default)]
    pub storage_condition: Option<String>,
    pub quantity: i64,
    /// Calendar date, `YYYY-MM-DD` (an RFC 3339 timestamp is accepted and truncated).
    pub expiry_date: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Validated intake, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub code: String,
    pub batch_number: Option<String>,
    pub unique_id: String,
    pub manufacturer: Option<String>,
    pub concentration: Option<String>,
    pub uncertainty: Option<String>,
    pub storage_condition: Option<String>,
    pub quantity: u32,
    pub expiry_date: NaiveDate,
    pub intake_status: MaterialStatus,
    pub images: Vec<String>,
    pub created_by: UserId,
}

impl MaterialDraft {
    /// Validate and normalise the draft.
    ///
    /// `intake_status` is classified against `today`; nothing here touches a store.
    pub fn validate(
        self,
        created_by: UserId,
        policy: &StatusPolicy,
        today: NaiveDate,
    ) -> DomainResult<NewMaterial> {
        let name = required("name", self.name)?;
        let code = required("code", self.code)?;
        let unique_id = required("unique_id", self.unique_id)?;
        let quantity = parse_quantity(self.quantity)?;
        let expiry_date = parse_expiry_date(&self.expiry_date)?;
        let images = validate_images(self.images)?;

        Ok(NewMaterial {
            name,
            code,
            batch_number: optional(self.batch_number),
            unique_id,
            manufacturer: optional(self.manufacturer),
            concentration: optional(self.concentration),
            uncertainty: optional(self.uncertainty),
            storage_condition: optional(self.storage_condition),
            quantity,
            expiry_date,
            intake_status: policy.classify(quantity, expiry_date, today),
            images,
            created_by,
        })
    }
}

/// Partial edit of a batch. Absent fields are left untouched; an empty string
/// clears an optional field.
///
/// Identity (`id`) and provenance (`created_by`) are not editable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub concentration: Option<String>,
    #[serde(default)]
    pub uncertainty: Option<String>,
    #[serde(default)]
    pub storage_condition: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Validated edit. For optional columns the outer `Option` means "touched".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterialChanges {
    pub name: Option<String>,
    pub code: Option<String>,
    pub batch_number: Option<Option<String>>,
    pub unique_id: Option<String>,
    pub manufacturer: Option<Option<String>>,
    pub concentration: Option<Option<String>>,
    pub uncertainty: Option<Option<String>>,
    pub storage_condition: Option<Option<String>>,
    pub quantity: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
    pub images: Option<Vec<String>>,
}

impl MaterialPatch {
    pub fn validate(self) -> DomainResult<MaterialChanges> {
        let changes = MaterialChanges {
            name: self.name.map(|v| required("name", v)).transpose()?,
            code: self.code.map(|v| required("code", v)).transpose()?,
            batch_number: self.batch_number.map(|v| optional(Some(v))),
            unique_id: self.unique_id.map(|v| required("unique_id", v)).transpose()?,
            manufacturer: self.manufacturer.map(|v| optional(Some(v))),
            concentration: self.concentration.map(|v| optional(Some(v))),
            uncertainty: self.uncertainty.map(|v| optional(Some(v))),
            storage_condition: self.storage_condition.map(|v| optional(Some(v))),
            quantity: self.quantity.map(parse_quantity).transpose()?,
            expiry_date: self
                .expiry_date
                .as_deref()
                .map(parse_expiry_date)
                .transpose()?,
            images: self.images.map(validate_images).transpose()?,
        };

        if changes.is_empty() {
            return Err(DomainError::validation("edit contains no changes"));
        }
        Ok(changes)
    }
}

impl MaterialChanges {
    pub fn is_empty(&self) -> bool {
        *self == MaterialChanges::default()
    }

    /// Apply onto a stored batch. Does not touch `version`/`updated_at`; the store owns those.
    pub fn apply_to(&self, batch: &mut MaterialBatch) {
        if let Some(v) = &self.name {
            batch.name = v.clone();
        }
        if let Some(v) = &self.code {
            batch.code = v.clone();
        }
        if let Some(v) = &self.batch_number {
            batch.batch_number = v.clone();
        }
        if let Some(v) = &self.unique_id {
            batch.unique_id = v.clone();
        }
        if let Some(v) = &self.manufacturer {
            batch.manufacturer = v.clone();
        }
        if let Some(v) = &self.concentration {
            batch.concentration = v.clone();
        }
        if let Some(v) = &self.uncertainty {
            batch.uncertainty = v.clone();
        }
        if let Some(v) = &self.storage_condition {
            batch.storage_condition = v.clone();
        }
        if let Some(v) = self.quantity {
            batch.quantity = v;
        }
        if let Some(v) = self.expiry_date {
            batch.expiry_date = v;
        }
        if let Some(v) = &self.images {
            batch.images = v.clone();
        }
    }
}

fn required(field: &str, value: String) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::required(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Largest quantity any store accepts (Postgres `INTEGER`).
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

fn parse_quantity(quantity: i64) -> DomainResult<u32> {
    if quantity < 0 {
        return Err(DomainError::validation("quantity cannot be negative"));
    }
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or_else(|| DomainError::validation(format!("quantity cannot exceed {MAX_QUANTITY}")))
}

/// Parse an expiry date supplied at the input boundary.
pub fn parse_expiry_date(raw: &str) -> DomainResult<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::required("expiry_date"));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| DomainError::validation(format!("expiry_date '{raw}' is not a valid date")))
}

pub(crate) fn validate_images(images: Vec<String>) -> DomainResult<Vec<String>> {
    if images.len() > MAX_IMAGES {
        return Err(DomainError::validation(format!(
            "at most {MAX_IMAGES} images can be attached"
        )));
    }
    if images.iter().any(|i| i.trim().is_empty()) {
        return Err(DomainError::validation("image reference cannot be empty"));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn draft() -> MaterialDraft {
        MaterialDraft {
            name: " Pb Standard ".to_string(),
            code: "GBW08619".to_string(),
            batch_number: Some("".to_string()),
            unique_id: "B2024-001".to_string(),
            quantity: 5,
            expiry_date: "2024-06-25".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_normalises_and_classifies() {
        let new = draft()
            .validate(UserId::new(), &StatusPolicy::default(), today())
            .unwrap();
        assert_eq!(new.name, "Pb Standard");
        assert_eq!(new.batch_number, None);
        assert_eq!(new.quantity, 5);
        assert_eq!(new.intake_status, MaterialStatus::Warning);
    }

    #[test]
    fn rejects_negative_quantity_and_bad_dates() {
        let mut d = draft();
        d.quantity = -1;
        assert!(matches!(
            d.validate(UserId::new(), &StatusPolicy::default(), today()),
            Err(DomainError::Validation(_))
        ));

        let mut d = draft();
        d.expiry_date = "31/12/2024".to_string();
        assert!(matches!(
            d.validate(UserId::new(), &StatusPolicy::default(), today()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn rejects_missing_required_fields_and_too_many_images() {
        let mut d = draft();
        d.unique_id = "   ".to_string();
        assert_eq!(
            d.validate(UserId::new(), &StatusPolicy::default(), today()),
            Err(DomainError::required("unique_id"))
        );

        let mut d = draft();
        d.images = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert!(d.validate(UserId::new(), &StatusPolicy::default(), today()).is_err());
    }

    #[test]
    fn quantity_is_capped_at_what_every_store_holds() {
        let mut d = draft();
        d.quantity = i64::from(MAX_QUANTITY);
        let new = d.validate(UserId::new(), &StatusPolicy::default(), today()).unwrap();
        assert_eq!(new.quantity, MAX_QUANTITY);

        let mut d = draft();
        d.quantity = i64::from(MAX_QUANTITY) + 1;
        assert!(matches!(
            d.validate(UserId::new(), &StatusPolicy::default(), today()),
            Err(DomainError::Validation(_))
        ));

        let patch = MaterialPatch {
            quantity: Some(i64::from(u32::MAX)),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn accepts_rfc3339_expiry() {
        assert_eq!(
            parse_expiry_date("2025-01-31T00:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn patch_clears_optional_fields_and_keeps_the_rest() {
        let new = draft()
            .validate(UserId::new(), &StatusPolicy::default(), today())
            .unwrap();
        let mut batch = MaterialBatch::from_new(MaterialId::new(), new, Utc::now());
        batch.manufacturer = Some("NIM".to_string());

        let changes = MaterialPatch {
            manufacturer: Some("".to_string()),
            quantity: Some(0),
            ..Default::default()
        }
        .validate()
        .unwrap();
        changes.apply_to(&mut batch);

        assert_eq!(batch.manufacturer, None);
        assert_eq!(batch.quantity, 0);
        assert_eq!(batch.name, "Pb Standard");
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(MaterialPatch::default().validate().is_err());
    }
}
