//! Source datetime → target date mapping.
//!
//! The target date columns take `YYYY-MM-DD`. Source timestamps parse as
//! UTC and format as UTC — no local-zone conversion anywhere.

use crate::error::{MigrationError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Convert an ISO-8601 datetime (or bare date) to a `YYYY-MM-DD` string.
pub fn to_target_date(input: &str) -> Result<String> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    // Zone-less timestamps are already UTC in the ProjectData feed.
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }

    Err(MigrationError::validation(format!(
        "unparseable datetime {input:?}"
    )))
}

/// Parse a source timestamp to a full UTC instant, for comparisons.
pub fn to_utc(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Err(MigrationError::validation(format!(
        "unparseable datetime {input:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_datetime() {
        assert_eq!(to_target_date("2024-03-15T09:00:00Z").unwrap(), "2024-03-15");
    }

    #[test]
    fn test_offset_normalized_to_utc() {
        // 01:00 at -05:00 is 06:00 UTC, same calendar day.
        assert_eq!(
            to_target_date("2024-03-15T01:00:00-05:00").unwrap(),
            "2024-03-15"
        );
        // 23:00 at -05:00 crosses into the next UTC day.
        assert_eq!(
            to_target_date("2024-03-15T23:00:00-05:00").unwrap(),
            "2024-03-16"
        );
    }

    #[test]
    fn test_naive_parsed_as_utc() {
        assert_eq!(to_target_date("2024-03-15T09:00:00").unwrap(), "2024-03-15");
        assert_eq!(
            to_target_date("2024-03-15T09:00:00.123").unwrap(),
            "2024-03-15"
        );
    }

    #[test]
    fn test_bare_date() {
        assert_eq!(to_target_date("2024-03-15").unwrap(), "2024-03-15");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(to_target_date("March 15th").is_err());
        assert!(to_target_date("").is_err());
    }
}
