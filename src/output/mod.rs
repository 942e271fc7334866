//! Rendering and exporting certificate records.
//!
//! # Submodules
//!
//! - `table` - terminal table and banner
//! - `export` - CSV export and re-read

pub mod export;
pub mod table;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ParseError;

/// Column headers shared by the table and the CSV export.
pub const COLUMNS: [&str; 7] = [
    "Host:Port",
    "Certificate Name",
    "Issue Date",
    "Expiry Date",
    "Self-Signed",
    "Expired",
    "Error",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Renders a timestamp, or an empty string when absent.
pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Inverse of [`format_timestamp`].
pub fn parse_timestamp(field: &str, value: &str) -> Result<Option<DateTime<Utc>>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| ParseError::Timestamp {
            field: field.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let time = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(Some(time)), "2025-03-09 07:05:01 UTC");
        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn test_parse_timestamp() {
        let time = Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap();
        let rendered = format_timestamp(Some(time));
        assert_eq!(parse_timestamp("Expiry Date", &rendered).unwrap(), Some(time));
        assert_eq!(parse_timestamp("Expiry Date", "").unwrap(), None);
        assert!(matches!(
            parse_timestamp("Expiry Date", "Jan  1 00:00:00 2025 GMT"),
            Err(ParseError::Timestamp { .. })
        ));
    }
}
