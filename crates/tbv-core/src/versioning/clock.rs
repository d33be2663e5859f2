//! Version instants for a logical run.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{TbvError, TbvResult};

/// Captures "now" once so every operation of a run shares one instant.
///
/// Reads are anchored `read_offset` after writes so that a read issued right
/// after a write in the same run observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionClock {
    captured: DateTime<Utc>,
    read_offset: Duration,
}

impl VersionClock {
    /// Capture the current instant.
    pub fn now(read_offset_secs: i64) -> Self {
        Self::at(Utc::now(), read_offset_secs)
    }

    /// Use a fixed instant.
    pub fn at(instant: DateTime<Utc>, read_offset_secs: i64) -> Self {
        Self {
            captured: instant,
            read_offset: Duration::seconds(read_offset_secs),
        }
    }

    pub fn write_instant(&self) -> DateTime<Utc> {
        self.captured
    }

    pub fn read_instant(&self) -> DateTime<Utc> {
        self.captured + self.read_offset
    }
}

/// Render an instant as a fixed-width UTC string, e.g. `2026-10-18T09:30:00.000Z`.
///
/// Equal width and a fixed zone keep string comparison chronological.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parameter value for an instant.
pub fn instant_value(instant: DateTime<Utc>) -> Value {
    Value::String(format_instant(instant))
}

/// Parse an RFC 3339 instant.
pub fn parse_instant(text: &str) -> TbvResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TbvError::invalid_instant(text, e.to_string()))
}

/// Re-render a caller-supplied instant in the [`format_instant`] shape.
///
/// Windows are stored and compared as strings, so an equivalent instant in
/// any other RFC 3339 form (offset, no fraction) would order wrongly.
pub fn normalize_instant(value: &Value) -> TbvResult<Value> {
    match value {
        Value::String(text) => parse_instant(text).map(instant_value),
        other => Err(TbvError::invalid_instant(
            other.to_string(),
            "expected an RFC 3339 string",
        )),
    }
}
