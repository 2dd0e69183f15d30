//! Configuration loading and representation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use labstock_inventory::{DEFAULT_WARNING_WINDOW_DAYS, StatusPolicy};
use labstock_observability::LogFormat;

use crate::service::InventorySettings;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Used when `JWT_SECRET` is unset. Never acceptable outside local development.
pub const DEV_JWT_SECRET: &str = "dev-insecure-secret-change-me";

/// Whether intake also writes an inbound movement record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeAudit {
    #[default]
    Disabled,
    Record,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres connection string; `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// True when `jwt_secret` is the built-in development value.
    pub jwt_secret_is_default: bool,
    pub bind_addr: String,
    pub warning_window_days: u32,
    pub intake_audit: IntakeAudit,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_secret_is_default: true,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            warning_window_days: DEFAULT_WARNING_WINDOW_DAYS,
            intake_audit: IntakeAudit::Disabled,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map (blank values count as unset).
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (defaults.jwt_secret, true),
        };

        let warning_window_days = match get("LABSTOCK_WARNING_DAYS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: "LABSTOCK_WARNING_DAYS",
                message: format!("'{raw}': {e}"),
            })?,
            None => defaults.warning_window_days,
        };

        let intake_audit = match get("LABSTOCK_AUDIT_INTAKE").map(|v| v.to_ascii_lowercase()) {
            None => defaults.intake_audit,
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => IntakeAudit::Record,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no") => IntakeAudit::Disabled,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LABSTOCK_AUDIT_INTAKE",
                    message: format!("'{other}' is not a boolean"),
                });
            }
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                key: "LOG_FORMAT",
                message: e.to_string(),
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            jwt_secret,
            jwt_secret_is_default,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            warning_window_days,
            intake_audit,
            log_format,
        })
    }

    pub fn inventory_settings(&self) -> InventorySettings {
        InventorySettings {
            policy: StatusPolicy::with_warning_window(self.warning_window_days),
            intake_audit: self.intake_audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = AppConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.jwt_secret_is_default);
        assert_eq!(config.inventory_settings().policy.warning_window_days, 30);
    }

    #[test]
    fn reads_every_key() {
        let config = AppConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgres://lab@localhost/stock"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("LABSTOCK_WARNING_DAYS", "60"),
            ("LABSTOCK_AUDIT_INTAKE", "TRUE"),
            ("LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://lab@localhost/stock"));
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.jwt_secret_is_default);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.warning_window_days, 60);
        assert_eq!(config.intake_audit, IntakeAudit::Record);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AppConfig::from_vars(vars(&[("DATABASE_URL", "  "), ("JWT_SECRET", "")])).unwrap();
        assert_eq!(config.database_url, None);
        assert!(config.jwt_secret_is_default);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = AppConfig::from_vars(vars(&[("LABSTOCK_WARNING_DAYS", "-3")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LABSTOCK_WARNING_DAYS", .. }));

        let err = AppConfig::from_vars(vars(&[("LABSTOCK_AUDIT_INTAKE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LABSTOCK_AUDIT_INTAKE", .. }));

        let err = AppConfig::from_vars(vars(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LOG_FORMAT", .. }));
    }
}
