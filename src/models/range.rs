//! Time ranges used to scope harvest queries.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use crate::error::{AppError, Result};

/// Format used when rendering a range back into a query parameter.
pub const INTERVAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Symbolic end value that resolves to the current time.
pub const NOW: &str = "now";

/// A closed interval `[start, end]` with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let start = truncate(start);
        let end = truncate(end);
        if start > end {
            return Err(AppError::invalid_range(format!(
                "start {} is after end {}",
                start.format(INTERVAL_FORMAT),
                end.format(INTERVAL_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse an ISO interval `start/end`, resolving `now` to the current time.
    pub fn parse(interval: &str) -> Result<Self> {
        Self::parse_at(interval, Utc::now().naive_utc())
    }

    /// Parse an ISO interval, resolving `now` to the supplied instant.
    pub fn parse_at(interval: &str, now: NaiveDateTime) -> Result<Self> {
        let parts: Vec<&str> = interval.split('/').collect();
        let [start, end] = parts.as_slice() else {
            return Err(AppError::invalid_range(format!(
                "'{interval}' is not a start/end interval"
            )));
        };

        let start = parse_timestamp(start).ok_or_else(|| {
            AppError::invalid_range(format!("cannot parse start of '{interval}'"))
        })?;
        let end = if end.trim().eq_ignore_ascii_case(NOW) {
            now
        } else {
            parse_timestamp(end).ok_or_else(|| {
                AppError::invalid_range(format!("cannot parse end of '{interval}'"))
            })?
        };

        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format(INTERVAL_FORMAT),
            self.end.format(INTERVAL_FORMAT)
        )
    }
}

/// Parse a timestamp in any of the shapes catalogs commonly use.
///
/// Offsets are normalized to UTC. A bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn truncate(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}
