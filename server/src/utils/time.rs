//! Time utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// Prefix of the sample text shown in empty date inputs
const DATE_PLACEHOLDER_PREFIX: &str = "eg.";

/// Parse a user-entered date.
///
/// Accepts `YYYYMMDD` and `YYYY-MM-DD`. Empty input, or the `eg. ...` sample
/// text, means "not applied" and yields `Ok(None)`.
pub fn parse_date_input(input: &str) -> Result<Option<NaiveDate>, String> {
    let s = input.trim();
    if s.is_empty() || s.starts_with(DATE_PLACEHOLDER_PREFIX) {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map(Some)
        .map_err(|_| format!("Invalid date '{}'. Expected YYYYMMDD or YYYY-MM-DD", s))
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`, with microseconds only when present
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Export file base name, `yyyyMMddHHmmss`
pub fn export_base_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Convert microseconds since Unix epoch to a naive UTC timestamp
pub fn micros_to_naive(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Days since Unix epoch for a date
pub fn date_to_days(date: &NaiveDate) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

/// Convert days since Unix epoch to a date
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_compact_date() {
        assert_eq!(
            parse_date_input("20240101").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn test_parse_dashed_date() {
        assert_eq!(
            parse_date_input(" 2024-04-01 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1)
        );
    }

    #[test]
    fn test_parse_empty_and_placeholder() {
        assert_eq!(parse_date_input("").unwrap(), None);
        assert_eq!(parse_date_input("   ").unwrap(), None);
        assert_eq!(parse_date_input("eg. 2 0 2 4 0 1 0 1").unwrap(), None);
    }

    #[test]
    fn test_parse_invalid_date() {
        assert!(parse_date_input("2024-13-01").is_err());
        assert!(parse_date_input("yesterday").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 4)
            .unwrap()
            .and_hms_micro_opt(0, 0, 0, 250)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-04 00:00:00.000250");
    }

    #[test]
    fn test_export_base_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(export_base_name(&at), "20240305140709");
    }

    #[test]
    fn test_epoch_conversions() {
        assert_eq!(days_to_date(0), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(days_to_date(19723), NaiveDate::from_ymd_opt(2024, 1, 1));
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_to_days(&day), Some(19723));
        let ts = micros_to_naive(1_704_067_200_000_000).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01 00:00:00");
    }
}
