//! Best-effort extraction from raw query output
//!
//! The device lookup returns whatever the database produced for the
//! request; this module pulls a handful of well-known values out of it with
//! prioritized patterns. Nothing here fails: a value that cannot be found is
//! left unset.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::line_protocol::timestamp::parse_instant;

/// A device is considered fresh if its last point is at most this old
pub const FRESHNESS_SECS: i64 = 300;

/// Snapshot value a rule fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    SeriesName,
    SeriesNo,
    Location,
    LastTime,
}

/// One pattern for a target. The first capture group is the value.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    pub target: Target,
    pub pattern: &'static str,
}

/// Rules in priority order; for each target the first matching rule wins
pub const EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        target: Target::SeriesName,
        pattern: r#"(?i)"ksave"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::SeriesName,
        pattern: r#"(?i)"series(?:_name)?"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::SeriesName,
        pattern: r#"(?i)"_measurement"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::SeriesName,
        pattern: r#"(?i)"name"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::SeriesNo,
        pattern: r#"(?i)"series_no"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"?"#,
    },
    ExtractionRule {
        target: Target::SeriesNo,
        pattern: r#"(?i)"(?:device|host|machine|id)"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"?"#,
    },
    ExtractionRule {
        target: Target::SeriesNo,
        pattern: r#"(?i)"_value"\s*:\s*([0-9.+\-eE]+)"#,
    },
    ExtractionRule {
        target: Target::Location,
        pattern: r#"(?i)"location"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::Location,
        pattern: r#"(?i)"site(?:_name)?"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::Location,
        pattern: r#"(?i)"loc"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::LastTime,
        pattern: r#"(?i)"_time"\s*:\s*"([^"]+)""#,
    },
    ExtractionRule {
        target: Target::LastTime,
        pattern: r#"(?i)"time"\s*:\s*"([^"]+)""#,
    },
];

/// Electrical readings picked up as `key[:=]number`
pub const ELECTRICAL_FIELDS: &[&str] = &[
    "current",
    "power_before",
    "power_metrics",
    "kWh",
    "P",
    "Q",
    "S",
    "PF",
    "THD",
    "F",
];

/// Generic reading that fills `power_before` when that is absent
const POWER_ALIAS: (&str, &str) = ("power", "power_before");

fn compiled_rules() -> &'static [(Target, Regex)] {
    static RULES: OnceLock<Vec<(Target, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        EXTRACTION_RULES
            .iter()
            .filter_map(|rule| Regex::new(rule.pattern).ok().map(|re| (rule.target, re)))
            .collect()
    })
}

// Word boundaries keep `P` from matching inside `PF` or `power`.
fn reading_pattern(key: &str) -> Option<Regex> {
    Regex::new(&format!(
        r#"(?i)"?\b{}\b"?\s*[:=]\s*"?([0-9.+\-eE]+)"?"#,
        regex::escape(key)
    ))
    .ok()
}

fn compiled_readings() -> &'static [(&'static str, Regex)] {
    static READINGS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    READINGS.get_or_init(|| {
        ELECTRICAL_FIELDS
            .iter()
            .copied()
            .chain(std::iter::once(POWER_ALIAS.0))
            .filter_map(|key| reading_pattern(key).map(|re| (key, re)))
            .collect()
    })
}

fn first_capture(raw: &str, target: Target) -> Option<String> {
    compiled_rules()
        .iter()
        .filter(|(t, _)| *t == target)
        .find_map(|(_, re)| re.captures(raw)?.get(1).map(|m| m.as_str().to_string()))
}

/// Values recovered from a device lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// RFC 3339 with milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_ago: Option<i64>,
    /// `secondsAgo <= 300`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Electrical readings keyed by field name
    #[serde(flatten)]
    pub readings: BTreeMap<String, f64>,
}

impl DeviceSnapshot {
    /// Extract a snapshot from raw query output, judging freshness against `now`
    pub fn extract(raw: &str, now: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            series_name: first_capture(raw, Target::SeriesName),
            series_no: first_capture(raw, Target::SeriesNo),
            location: first_capture(raw, Target::Location),
            ..Default::default()
        };

        if let Some(time) = first_capture(raw, Target::LastTime).as_deref().and_then(parse_instant) {
            let seconds_ago = (now - time).num_milliseconds().div_euclid(1000);
            snapshot.last_time = Some(time.to_rfc3339_opts(SecondsFormat::Millis, true));
            snapshot.seconds_ago = Some(seconds_ago);
            snapshot.ok = Some(seconds_ago <= FRESHNESS_SECS);
        }

        for (key, re) in compiled_readings() {
            let Some(value) = re
                .captures(raw)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .filter(|v| v.is_finite())
            else {
                continue;
            };

            if *key == POWER_ALIAS.0 {
                snapshot
                    .readings
                    .entry(POWER_ALIAS.1.to_string())
                    .or_insert(value);
            } else {
                snapshot.readings.insert(key.to_string(), value);
            }
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn rule_matches(index: usize, text: &str) -> Option<String> {
        let re = Regex::new(EXTRACTION_RULES[index].pattern).unwrap();
        re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(compiled_rules().len(), EXTRACTION_RULES.len());
        assert_eq!(compiled_readings().len(), ELECTRICAL_FIELDS.len() + 1);
    }

    #[test]
    fn test_series_name_rules() {
        assert_eq!(rule_matches(0, r#"{"KSAVE": "Ksave01"}"#).as_deref(), Some("Ksave01"));
        assert_eq!(rule_matches(1, r#""series_name":"line-1""#).as_deref(), Some("line-1"));
        assert_eq!(rule_matches(1, r#""series":"line-2""#).as_deref(), Some("line-2"));
        assert_eq!(rule_matches(2, r#""_measurement" : "machines""#).as_deref(), Some("machines"));
        assert_eq!(rule_matches(3, r#""name":"KSave01""#).as_deref(), Some("KSave01"));
    }

    #[test]
    fn test_series_no_rules() {
        assert_eq!(rule_matches(4, r#""series_no":"1234567890""#).as_deref(), Some("1234567890"));
        assert_eq!(rule_matches(5, r#""host": 42"#).as_deref(), Some("42"));
        assert_eq!(rule_matches(5, r#""device":"Ksave01""#), None);
        assert_eq!(rule_matches(6, r#""_value": 3.5e2"#).as_deref(), Some("3.5e2"));
    }

    #[test]
    fn test_location_rules() {
        assert_eq!(rule_matches(7, r#""location":"Plant 1""#).as_deref(), Some("Plant 1"));
        assert_eq!(rule_matches(8, r#""site":"Site A""#).as_deref(), Some("Site A"));
        assert_eq!(rule_matches(8, r#""site_name":"Site B""#).as_deref(), Some("Site B"));
        assert_eq!(rule_matches(9, r#""loc":"Roof""#).as_deref(), Some("Roof"));
    }

    #[test]
    fn test_last_time_rules() {
        assert_eq!(
            rule_matches(10, r#""_time":"2024-01-15T09:58:00Z""#).as_deref(),
            Some("2024-01-15T09:58:00Z")
        );
        assert_eq!(rule_matches(11, r#""time":"x""#).as_deref(), Some("x"));
    }

    #[test]
    fn test_priority_order() {
        let raw = r#"{"_measurement":"machines","name":"KSave01","ksave":"Ksave01","site":"Site A","location":"Plant"}"#;
        let snapshot = DeviceSnapshot::extract(raw, now());
        assert_eq!(snapshot.series_name.as_deref(), Some("Ksave01"));
        assert_eq!(snapshot.location.as_deref(), Some("Plant"));
    }

    #[test]
    fn test_freshness_boundary() {
        let fresh = DeviceSnapshot::extract(r#""_time":"2024-01-15T09:55:01Z""#, now());
        assert_eq!(fresh.seconds_ago, Some(299));
        assert_eq!(fresh.ok, Some(true));
        assert_eq!(fresh.last_time.as_deref(), Some("2024-01-15T09:55:01.000Z"));

        let stale = DeviceSnapshot::extract(r#""_time":"2024-01-15T09:54:59Z""#, now());
        assert_eq!(stale.seconds_ago, Some(301));
        assert_eq!(stale.ok, Some(false));
    }

    #[test]
    fn test_unparsable_time_leaves_freshness_unset() {
        let snapshot = DeviceSnapshot::extract(r#""_time":"soon""#, now());
        assert_eq!(snapshot.last_time, None);
        assert_eq!(snapshot.seconds_ago, None);
        assert_eq!(snapshot.ok, None);
    }

    #[test]
    fn test_electrical_readings() {
        let raw = "machines,device=Ksave01 current=0.12,power_before=120,kWh=0.12,P=120,Q=24,S=122.376,PF=0.981,THD=3.2,F=50";
        let snapshot = DeviceSnapshot::extract(raw, now());

        assert_eq!(snapshot.readings["current"], 0.12);
        assert_eq!(snapshot.readings["power_before"], 120.0);
        assert_eq!(snapshot.readings["P"], 120.0);
        assert_eq!(snapshot.readings["PF"], 0.981);
        assert_eq!(snapshot.readings["F"], 50.0);
        assert!(!snapshot.readings.contains_key("power_metrics"));
    }

    #[test]
    fn test_readings_ignore_key_case() {
        let snapshot = DeviceSnapshot::extract(r#"{"kwh": 1.5, "pf": 0.92, "Power": 95}"#, now());

        assert_eq!(snapshot.readings.get("kWh"), Some(&1.5));
        assert_eq!(snapshot.readings.get("PF"), Some(&0.92));
        assert_eq!(snapshot.readings.get("power_before"), Some(&95.0));
        assert!(!snapshot.readings.contains_key("P"));
        assert!(!snapshot.readings.contains_key("F"));
    }

    #[test]
    fn test_power_fills_power_before_only_when_absent() {
        let snapshot = DeviceSnapshot::extract(r#""power": 95"#, now());
        assert_eq!(snapshot.readings.get("power_before"), Some(&95.0));

        let snapshot = DeviceSnapshot::extract(r#""power_before": 120, "power": 95"#, now());
        assert_eq!(snapshot.readings.get("power_before"), Some(&120.0));
    }

    #[test]
    fn test_nothing_found() {
        let snapshot = DeviceSnapshot::extract("", now());
        assert_eq!(snapshot, DeviceSnapshot::default());
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_serialized_shape() {
        let snapshot = DeviceSnapshot::extract(r#""ksave":"Ksave01","_time":"2024-01-15T09:59:00Z","kWh":1.5"#, now());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["seriesName"], "Ksave01");
        assert_eq!(value["secondsAgo"], 60);
        assert_eq!(value["ok"], true);
        assert_eq!(value["kWh"], 1.5);
    }
}
