use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::material::MaterialBatch;
use crate::status::{MaterialStatus, StatusPolicy};

/// Search + status tab over the batch list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialQuery {
    /// Case-insensitive match on name, code or unique_id.
    #[serde(default)]
    pub text: Option<String>,
    /// Keep only batches whose derived status equals this one.
    #[serde(default)]
    pub status: Option<MaterialStatus>,
}

impl MaterialQuery {
    pub fn matches(&self, batch: &MaterialBatch, today: NaiveDate, policy: &StatusPolicy) -> bool {
        if let Some(status) = self.status {
            if batch.status_on(today, policy) != status {
                return false;
            }
        }

        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                batch.name.to_lowercase().contains(&needle)
                    || batch.code.to_lowercase().contains(&needle)
                    || batch.unique_id.to_lowercase().contains(&needle)
            }
        }
    }

    pub fn apply(
        &self,
        batches: &[MaterialBatch],
        today: NaiveDate,
        policy: &StatusPolicy,
    ) -> Vec<MaterialBatch> {
        batches
            .iter()
            .filter(|b| self.matches(b, today, policy))
            .cloned()
            .collect()
    }
}
