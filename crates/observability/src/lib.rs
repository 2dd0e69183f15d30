//! Process-wide tracing/logging setup.

pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError};

/// Initialize tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
