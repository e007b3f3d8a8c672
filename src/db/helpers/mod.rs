use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as RFC3339 text with a fixed nine-digit fraction and
/// a `Z` suffix, so values round-trip exactly and sort chronologically as
/// plain strings.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Builds `?N, ?N+1, ...` placeholders for an `IN (...)` clause.
pub fn numbered_placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn datetime_round_trip_keeps_subsecond_precision() {
        let stamp = DateTime::parse_from_rfc3339("2024-05-01T09:30:15.750123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let stored = format_datetime(stamp);
        assert_eq!(stored, "2024-05-01T09:30:15.750123456Z");
        assert_eq!(parse_datetime(&stored, "timestamp").unwrap(), stamp);
    }

    #[test]
    fn stored_text_sorts_chronologically() {
        let base = DateTime::parse_from_rfc3339("2024-05-01T09:30:15Z")
            .unwrap()
            .with_timezone(&Utc);
        let whole = format_datetime(base);
        let later = format_datetime(base + Duration::milliseconds(100));
        let next_second = format_datetime(base + Duration::seconds(1));
        assert!(whole < later);
        assert!(later < next_second);
    }

    #[test]
    fn unparsable_timestamp_is_an_error() {
        assert!(parse_datetime("garbage", "timestamp").is_err());
    }

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(numbered_placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(numbered_placeholders(1, 0), "");
    }
}
