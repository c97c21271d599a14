//! Database models and queries

pub mod cards;
pub mod decks;
pub mod init;
pub mod likes;
pub mod media;
pub mod models;
pub mod profiles;
pub mod progress;
pub mod species;

pub use init::*;
pub use models::*;

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Format a timestamp for storage
///
/// All timestamps are written by the application in one fixed-width UTC
/// format so that SQL string comparison matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

/// Parse a stored UUID
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in database '{}': {}", value, e)))
}
