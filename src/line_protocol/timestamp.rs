//! Timestamp normalization
//!
//! Writes are sent with `precision=s`, so every accepted timestamp shape is
//! reduced to whole epoch seconds. Numbers are taken as-is (floored); text is
//! tried as a number first and then as a calendar timestamp.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Naive formats tried after RFC 3339 / RFC 2822, interpreted as UTC
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Normalize a JSON timestamp to epoch seconds.
///
/// Returns `None` for anything that cannot be interpreted; the point is then
/// written without a timestamp and the database assigns ingest time.
pub fn normalize(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(floor_seconds),
        Value::String(s) => normalize_str(s),
        _ => None,
    }
}

/// Normalize a textual timestamp to epoch seconds
pub fn normalize_str(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(n) = raw.parse::<f64>() {
        return floor_seconds(n);
    }

    parse_instant(raw).map(|dt| dt.timestamp())
}

/// Parse a calendar timestamp (RFC 3339, RFC 2822 or a common naive layout)
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

fn floor_seconds(n: f64) -> Option<i64> {
    if n.is_finite() {
        Some(n.floor() as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_are_floored() {
        assert_eq!(normalize(&json!(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(normalize(&json!(1_700_000_000.9)), Some(1_700_000_000));
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(normalize(&json!("1700000000")), Some(1_700_000_000));
        assert_eq!(normalize(&json!(" 42.7 ")), Some(42));
    }

    #[test]
    fn test_iso_strings() {
        assert_eq!(normalize(&json!("2024-01-15T10:00:00Z")), Some(1_705_312_800));
        assert_eq!(normalize(&json!("2024-01-15T12:00:00+02:00")), Some(1_705_312_800));
        assert_eq!(normalize(&json!("2024-01-15T10:00:00.999Z")), Some(1_705_312_800));
        assert_eq!(normalize(&json!("2024-01-15 10:00:00")), Some(1_705_312_800));
        assert_eq!(normalize(&json!("2024-01-15")), Some(1_705_276_800));
    }

    #[test]
    fn test_unparsable_is_none() {
        assert_eq!(normalize(&json!("yesterday-ish")), None);
        assert_eq!(normalize(&json!("")), None);
        assert_eq!(normalize(&json!(true)), None);
        assert_eq!(normalize(&json!({"ts": 1})), None);
        assert_eq!(normalize(&Value::Null), None);
    }
}
