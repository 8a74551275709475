//! Query time windows
//!
//! A window is either a validated relative range (`-15m`, `-6h`, `-7d`) or a
//! fixed ±60 s span around an absolute instant.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::line_protocol::timestamp::{normalize_str, parse_instant};
use crate::query::error::{QueryError, QueryResult};

/// Range used when none is given or the given one is rejected
pub const DEFAULT_RANGE: &str = "-1h";

/// Half-width of the window around an absolute instant
pub const INSTANT_WINDOW_SECS: i64 = 60;

fn range_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^-[0-9]+(m|h|d)$").ok())
        .as_ref()
}

/// A relative range that passed the allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeRange(String);

impl RelativeRange {
    /// Accept `raw` only when it matches `-<digits>(m|h|d)`
    pub fn parse(raw: &str) -> Option<Self> {
        range_pattern()
            .filter(|re| re.is_match(raw))
            .map(|_| Self(raw.to_string()))
    }

    /// Parse `raw`, silently falling back to `default`
    pub fn parse_or(raw: Option<&str>, default: &RelativeRange) -> Self {
        raw.and_then(Self::parse).unwrap_or_else(|| default.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RelativeRange {
    fn default() -> Self {
        Self(DEFAULT_RANGE.to_string())
    }
}

impl fmt::Display for RelativeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time window of a read query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryWindow {
    /// `range(start: -1h)`
    Relative(RelativeRange),
    /// `range(start: ..., stop: ...)` around an instant
    Around {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

impl QueryWindow {
    /// Window of ±60 s around `at`; `None` when either edge is out of range
    pub fn around(at: DateTime<Utc>) -> Option<Self> {
        let half = Duration::seconds(INSTANT_WINDOW_SECS);
        Some(Self::Around {
            start: at.checked_sub_signed(half)?,
            stop: at.checked_add_signed(half)?,
        })
    }

    /// Build a window from request parameters. A non-empty `at` wins over `range`.
    pub fn from_params(
        range: Option<&str>,
        at: Option<&str>,
        default: &RelativeRange,
    ) -> QueryResult<Self> {
        match at.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_instant(raw)
                .or_else(|| normalize_str(raw).and_then(|secs| DateTime::from_timestamp(secs, 0)))
                .and_then(Self::around)
                .ok_or_else(|| QueryError::InvalidInstant(raw.to_string())),
            None => Ok(Self::Relative(RelativeRange::parse_or(range, default))),
        }
    }

    /// The Flux `range(...)` call for this window
    pub fn flux_range(&self) -> String {
        match self {
            Self::Relative(range) => format!("range(start: {})", range),
            Self::Around { start, stop } => format!(
                "range(start: {}, stop: {})",
                start.to_rfc3339_opts(SecondsFormat::Millis, true),
                stop.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
        }
    }
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self::Relative(RelativeRange::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_allow_list() {
        for ok in ["-15m", "-6h", "-7d", "-1h", "-100d"] {
            assert_eq!(RelativeRange::parse(ok).map(|r| r.0), Some(ok.to_string()));
        }
        for bad in ["1h", "-1w", "-h", "-1h; drop", "now()", "", "-1.5h", "-١h"] {
            assert_eq!(RelativeRange::parse(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_rejected_range_falls_back_silently() {
        let default = RelativeRange::default();
        assert_eq!(RelativeRange::parse_or(Some("1h"), &default).as_str(), "-1h");
        assert_eq!(RelativeRange::parse_or(None, &default).as_str(), "-1h");
        assert_eq!(RelativeRange::parse_or(Some("-6h"), &default).as_str(), "-6h");
    }

    #[test]
    fn test_relative_flux_range() {
        let window = QueryWindow::from_params(Some("-15m"), None, &RelativeRange::default()).unwrap();
        assert_eq!(window.flux_range(), "range(start: -15m)");
    }

    #[test]
    fn test_instant_window() {
        let window = QueryWindow::from_params(
            Some("-6h"),
            Some("2024-01-15T10:00:00Z"),
            &RelativeRange::default(),
        )
        .unwrap();

        assert_eq!(
            window.flux_range(),
            "range(start: 2024-01-15T09:59:00.000Z, stop: 2024-01-15T10:01:00.000Z)"
        );
    }

    #[test]
    fn test_epoch_instant() {
        let window =
            QueryWindow::from_params(None, Some("1705312800"), &RelativeRange::default()).unwrap();
        assert_eq!(
            window.flux_range(),
            "range(start: 2024-01-15T09:59:00.000Z, stop: 2024-01-15T10:01:00.000Z)"
        );
    }

    #[test]
    fn test_blank_instant_ignored() {
        let window = QueryWindow::from_params(None, Some("  "), &RelativeRange::default()).unwrap();
        assert_eq!(window, QueryWindow::default());
    }

    #[test]
    fn test_invalid_instant() {
        let result = QueryWindow::from_params(None, Some("noon-ish"), &RelativeRange::default());
        assert_eq!(result, Err(QueryError::InvalidInstant("noon-ish".to_string())));
    }

    #[test]
    fn test_instant_at_calendar_limits() {
        let default = RelativeRange::default();
        for at in [
            DateTime::<Utc>::MAX_UTC.timestamp().to_string(),
            DateTime::<Utc>::MIN_UTC.timestamp().to_string(),
        ] {
            assert_eq!(
                QueryWindow::from_params(None, Some(&at), &default),
                Err(QueryError::InvalidInstant(at.clone()))
            );
        }
    }

    #[test]
    fn test_range_must_match_exactly() {
        assert_eq!(RelativeRange::parse(" -1h "), None);
        assert_eq!(RelativeRange::parse("-1h\n"), None);
    }
}
