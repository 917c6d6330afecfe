//! ---
//! fhm_section: "01-core-functionality"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Shared primitives and utilities for the fuel health monitor runtime."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::time::Instant;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

/// Capture the current UTC wall-clock time used to stamp telemetry records.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Capture an instant suitable for duration measurements.
pub fn monotonic_now() -> Instant {
    Instant::now()
}

/// Parse a `YYYY-MM-DD` day boundary as used by the export query parameters.
pub fn parse_day(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

/// Midnight UTC at the start of the given day.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Midnight UTC at the start of the following day. Filtering with an
/// exclusive comparison against this boundary keeps the supplied end date
/// itself inside the range.
pub fn day_after(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.checked_add_days(Days::new(1)).map(day_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_boundaries() {
        let day = parse_day("2024-03-07").unwrap();
        assert_eq!(day_start(day).to_rfc3339(), "2024-03-07T00:00:00+00:00");
        assert_eq!(
            day_after(day).unwrap().to_rfc3339(),
            "2024-03-08T00:00:00+00:00"
        );
    }

    #[test]
    fn rejects_non_iso_days() {
        assert!(parse_day("07/03/2024").is_err());
        assert!(parse_day("2024-3-7x").is_err());
    }
}
