use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::warn;

/// Formats accepted for timestamps without an explicit offset; read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Formats accepted for timestamps with an offset that RFC 3339 rejects
/// (e.g. `+0000` without a colon).
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parses a report timestamp.
///
/// Accepts RFC 3339 and the variants CI reports emit in practice, with or without
/// fractional seconds and timezone:
///
/// - `2024-12-23T02:56:37.036690+00:00`
/// - `2024-12-23T02:56:37.036690`
/// - `2024-12-23T02:56:37+0000`
/// - `2024-12-23T02:56:37Z`
/// - `2024-12-23 02:56:37`
///
/// Timestamps without an offset are interpreted as UTC. Returns `None` when no
/// format matches.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|naive| naive.and_utc())
        })
}

/// Converts a duration in (possibly fractional) seconds, as reported by JUnit
/// `time` attributes, to a [`Duration`]. Negative or non-finite values map to zero.
pub fn seconds(value: f64) -> Duration {
    if !value.is_finite() || value <= 0.0 {
        return Duration::zero();
    }
    #[allow(clippy::cast_possible_truncation)]
    Duration::microseconds((value * 1_000_000.0).round() as i64)
}

/// `start + duration`, or `start` when the sum leaves the range chrono can represent.
pub fn offset_by(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    start.checked_add_signed(duration).unwrap_or_else(|| {
        warn!("Duration of {duration} from {start} is out of range, keeping the start time");
        start
    })
}

/// Formats a timestamp the way output file names embed it.
pub fn data_pipeline_format(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f%z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expected(micros: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 23, 2, 56, 37).unwrap()
            + Duration::microseconds(i64::from(micros))
    }

    #[test]
    fn test_parse_supported_formats() {
        assert_eq!(
            parse_timestamp("2024-12-23T02:56:37.036690+00:00"),
            Some(expected(36690))
        );
        assert_eq!(
            parse_timestamp("2024-12-23T02:56:37.036690"),
            Some(expected(36690))
        );
        assert_eq!(parse_timestamp("2024-12-23T02:56:37+0000"), Some(expected(0)));
        assert_eq!(parse_timestamp("2024-12-23T02:56:37Z"), Some(expected(0)));
        assert_eq!(parse_timestamp("2024-12-23T02:56:37"), Some(expected(0)));
        assert_eq!(parse_timestamp("2024-12-23 02:56:37"), Some(expected(0)));
    }

    #[test]
    fn test_parse_converts_offsets_to_utc() {
        assert_eq!(
            parse_timestamp("2024-12-23T04:56:37+02:00"),
            Some(expected(0))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45T99:00:00"), None);
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(1.5), Duration::milliseconds(1500));
        assert_eq!(seconds(0.000_001), Duration::microseconds(1));
        assert_eq!(seconds(-3.0), Duration::zero());
        assert_eq!(seconds(f64::NAN), Duration::zero());
    }

    #[test]
    fn test_offset_by_saturates_at_start() {
        let start = expected(0);
        assert_eq!(offset_by(start, seconds(1.5)), start + Duration::milliseconds(1500));
        assert_eq!(offset_by(start, seconds(1e13)), start);
        assert_eq!(
            offset_by(DateTime::<Utc>::MAX_UTC, Duration::microseconds(1)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_data_pipeline_format() {
        assert_eq!(
            data_pipeline_format(&expected(36690)),
            "2024-12-23T02:56:37.036690+0000"
        );
    }
}
