//! Aggregation view: grouping by material name and per-status counts.
//!
//! Everything here is recomputed from the full batch list; there are no
//! incremental counters to drift.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::material::{MaterialBatch, MaterialView};
use crate::record::MovementRecord;
use crate::status::{MaterialStatus, StatusPolicy};

/// How many records the dashboard shows.
pub const RECENT_RECORDS: usize = 5;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub normal: usize,
    pub warning: usize,
    pub expired: usize,
    pub low: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: MaterialStatus) {
        self.total += 1;
        match status {
            MaterialStatus::Normal => self.normal += 1,
            MaterialStatus::Warning => self.warning += 1,
            MaterialStatus::Expired => self.expired += 1,
            MaterialStatus::Low => self.low += 1,
        }
    }

    pub fn get(&self, status: MaterialStatus) -> usize {
        match status {
            MaterialStatus::Normal => self.normal,
            MaterialStatus::Warning => self.warning,
            MaterialStatus::Expired => self.expired,
            MaterialStatus::Low => self.low,
        }
    }
}

/// Group batches by material name. Within a group, input order is preserved.
pub fn group_by_name(batches: &[MaterialBatch]) -> BTreeMap<String, Vec<MaterialBatch>> {
    let mut groups: BTreeMap<String, Vec<MaterialBatch>> = BTreeMap::new();
    for batch in batches {
        groups.entry(batch.name.clone()).or_default().push(batch.clone());
    }
    groups
}

pub fn compute_status_counts(
    batches: &[MaterialBatch],
    today: NaiveDate,
    policy: &StatusPolicy,
) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for batch in batches {
        counts.add(batch.status_on(today, policy));
    }
    counts
}

/// `unique_id`s carried by more than one batch, with the batches sharing them.
pub fn duplicate_unique_ids(batches: &[MaterialBatch]) -> BTreeMap<String, Vec<MaterialBatch>> {
    let mut by_uid: BTreeMap<String, Vec<MaterialBatch>> = BTreeMap::new();
    for batch in batches {
        by_uid
            .entry(batch.unique_id.to_lowercase())
            .or_default()
            .push(batch.clone());
    }
    by_uid.retain(|_, v| v.len() > 1);
    by_uid
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialGroup {
    pub name: String,
    pub total_quantity: u64,
    pub counts: StatusCounts,
    pub batches: Vec<MaterialView>,
}

/// Dashboard/listing projection of one batch set on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryOverview {
    pub as_of: NaiveDate,
    pub counts: StatusCounts,
    pub groups: Vec<MaterialGroup>,
}

impl InventoryOverview {
    pub fn build(batches: &[MaterialBatch], today: NaiveDate, policy: &StatusPolicy) -> Self {
        let groups = group_by_name(batches)
            .into_iter()
            .map(|(name, members)| {
                let views: Vec<MaterialView> = members
                    .into_iter()
                    .map(|b| MaterialView::new(b, today, policy))
                    .collect();
                let mut counts = StatusCounts::default();
                for v in &views {
                    counts.add(v.status);
                }
                MaterialGroup {
                    name,
                    total_quantity: views.iter().map(|v| u64::from(v.batch.quantity)).sum(),
                    counts,
                    batches: views,
                }
            })
            .collect();

        Self {
            as_of: today,
            counts: compute_status_counts(batches, today, policy),
            groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub as_of: NaiveDate,
    pub counts: StatusCounts,
    pub recent_records: Vec<MovementRecord>,
}

impl Dashboard {
    /// `records` must be newest first.
    pub fn build(
        batches: &[MaterialBatch],
        records: &[MovementRecord],
        today: NaiveDate,
        policy: &StatusPolicy,
    ) -> Self {
        Self {
            as_of: today,
            counts: compute_status_counts(batches, today, policy),
            recent_records: records.iter().take(RECENT_RECORDS).cloned().collect(),
        }
    }
}
