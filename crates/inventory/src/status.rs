//! Status classification of a material batch.
//!
//! Status is never authoritative state: it is derived from quantity and expiry
//! date against the current calendar date, at every read.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days before expiry at which a batch starts showing as `warning`.
pub const DEFAULT_WARNING_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialStatus {
    Normal,
    Warning,
    Expired,
    Low,
}

impl MaterialStatus {
    pub const ALL: [MaterialStatus; 4] = [
        MaterialStatus::Normal,
        MaterialStatus::Warning,
        MaterialStatus::Expired,
        MaterialStatus::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Normal => "normal",
            MaterialStatus::Warning => "warning",
            MaterialStatus::Expired => "expired",
            MaterialStatus::Low => "low",
        }
    }
}

impl core::fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MaterialStatus {
    type Err = labstock_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MaterialStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                labstock_core::DomainError::validation(format!(
                    "status must be one of: normal, warning, expired, low (got '{s}')"
                ))
            })
    }
}

/// Classification thresholds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    pub warning_window_days: u32,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            warning_window_days: DEFAULT_WARNING_WINDOW_DAYS,
        }
    }
}

impl StatusPolicy {
    pub fn with_warning_window(days: u32) -> Self {
        Self {
            warning_window_days: days,
        }
    }

    /// Classify a batch. First match wins:
    ///
    /// 1. `quantity == 0` → `Low` (even when already expired)
    /// 2. `expiry_date < today` → `Expired`
    /// 3. `expiry_date <= today + window` → `Warning`
    /// 4. otherwise → `Normal`
    pub fn classify(&self, quantity: u32, expiry_date: NaiveDate, today: NaiveDate) -> MaterialStatus {
        if quantity == 0 {
            return MaterialStatus::Low;
        }
        if expiry_date < today {
            return MaterialStatus::Expired;
        }
        // Past the end of the calendar everything is inside the window.
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.warning_window_days)))
            .unwrap_or(NaiveDate::MAX);
        if expiry_date <= horizon {
            return MaterialStatus::Warning;
        }
        MaterialStatus::Normal
    }
}

/// Classify with the default 30-day warning window.
pub fn classify(quantity: u32, expiry_date: NaiveDate, today: NaiveDate) -> MaterialStatus {
    StatusPolicy::default().classify(quantity, expiry_date, today)
}
