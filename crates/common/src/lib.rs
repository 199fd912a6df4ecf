//! Shared types used across all pjman crates: the error-report contract,
//! the serializable command record, and the millisecond clock.

pub mod record;
pub mod report;

pub use {record::CommandRecord, report::ErrorReport};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
