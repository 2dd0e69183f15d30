//! Infrastructure layer: stores (in-memory and Postgres), the inventory
//! workflows built on them, and configuration.

pub mod config;
pub mod service;
pub mod store;

pub use config::{AppConfig, ConfigError, IntakeAudit};
pub use service::{
    Inbox, ServiceError, InventoryService, InventorySettings, Issuance, MessageService,
    ReconcileFailure, ReconcileReport, TransactionRecorder, WorkflowStep,
};
pub use store::{
    IntentState, IssuanceIntent, IssuanceJournal, MaterialRepository, MessageStore, PostgresStore,
    RecordStore, StoreError,
};

#[cfg(test)]
mod integration_tests;
