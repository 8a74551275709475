//! Flux statement construction
//!
//! Every caller-controlled value reaches a script either through an
//! allow-listed type ([`QueryWindow`], [`FieldFilter`]) or through
//! [`string_literal`].

use crate::query::filter::FieldFilter;
use crate::query::window::{QueryWindow, RelativeRange};

/// Columns kept by the current-values query
pub const CURRENT_COLUMNS: &[&str] = &[
    "_time",
    "_measurement",
    "_field",
    "_value",
    "ksave",
    "device",
    "location",
];

/// Look-back of tag value enumeration
pub const TAG_VALUES_START: &str = "-30d";

/// Window searched by a device lookup
pub const DEVICE_LOOKUP_RANGE: &str = "-1h";

/// Quote a value as a Flux string literal
pub fn string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Pipeline builder for `from(bucket: ...) |> ...` scripts
#[derive(Debug, Clone)]
pub struct FluxQuery {
    source: String,
    stages: Vec<String>,
}

impl FluxQuery {
    pub fn from_bucket(bucket: &str) -> Self {
        Self {
            source: format!("from(bucket: {})", string_literal(bucket)),
            stages: Vec::new(),
        }
    }

    pub fn range(self, window: &QueryWindow) -> Self {
        self.stage(window.flux_range())
    }

    /// Add a raw `filter(fn: (r) => <predicate>)` stage
    pub fn filter(self, predicate: impl AsRef<str>) -> Self {
        let stage = format!("filter(fn: (r) => {})", predicate.as_ref());
        self.stage(stage)
    }

    pub fn filter_fields(self, fields: &FieldFilter) -> Self {
        self.filter(format!("r._field =~ {}", fields.to_flux()))
    }

    pub fn last(self) -> Self {
        self.stage("last()".to_string())
    }

    pub fn keep(self, columns: &[&str]) -> Self {
        let columns = columns
            .iter()
            .map(|c| string_literal(c))
            .collect::<Vec<_>>()
            .join(", ");
        self.stage(format!("keep(columns: [{}])", columns))
    }

    fn stage(mut self, stage: String) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(&self) -> String {
        let mut script = self.source.clone();
        for stage in &self.stages {
            script.push_str("\n  |> ");
            script.push_str(stage);
        }
        script
    }
}

/// Latest value of each current-like field within the window
pub fn current_values(bucket: &str, window: &QueryWindow, fields: &FieldFilter) -> String {
    FluxQuery::from_bucket(bucket)
        .range(window)
        .filter_fields(fields)
        .last()
        .keep(CURRENT_COLUMNS)
        .build()
}

/// Distinct values of one tag over the last 30 days
pub fn tag_values(bucket: &str, tag: &str) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\nschema.tagValues(bucket: {}, tag: {}, start: {})\n|> sort()",
        string_literal(bucket),
        string_literal(tag),
        TAG_VALUES_START
    )
}

/// Most recent points of the last hour carrying `id` under any of `tag_keys`
pub fn device_lookup(bucket: &str, id: &str, tag_keys: &[String]) -> String {
    let id = string_literal(id);
    let matches = tag_keys
        .iter()
        .map(|key| {
            let column = column_ref(key);
            format!("(exists {column} and {column} == {id})")
        })
        .collect::<Vec<_>>()
        .join(" or ");

    let predicate = if matches.is_empty() {
        "r._measurement != \"\"".to_string()
    } else {
        format!("r._measurement != \"\" and ({})", matches)
    };

    FluxQuery::from_bucket(bucket)
        .range(&QueryWindow::Relative(
            RelativeRange::parse(DEVICE_LOOKUP_RANGE).unwrap_or_default(),
        ))
        .filter(predicate)
        .last()
        .build()
}

/// `r.key` for identifiers, `r["key"]` otherwise
fn column_ref(key: &str) -> String {
    let is_identifier = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if is_identifier {
        format!("r.{}", key)
    } else {
        format!("r[{}]", string_literal(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("k_db"), r#""k_db""#);
        assert_eq!(string_literal(r#"a"b"#), r#""a\"b""#);
        assert_eq!(string_literal(r"a\b"), r#""a\\b""#);
        assert_eq!(string_literal("${x}"), r#""\${x}""#);
        assert_eq!(string_literal("$5"), r#""$5""#);
    }

    #[test]
    fn test_current_values_script() {
        let window = QueryWindow::Relative(RelativeRange::parse("-15m").unwrap());
        let script = current_values("k_db", &window, &FieldFilter::default());

        assert_eq!(
            script,
            "from(bucket: \"k_db\")\n  |> range(start: -15m)\n  |> filter(fn: (r) => r._field =~ /(?i)current|amp|i|ia|ib|ic/)\n  |> last()\n  |> keep(columns: [\"_time\", \"_measurement\", \"_field\", \"_value\", \"ksave\", \"device\", \"location\"])"
        );
    }

    #[test]
    fn test_tag_values_script() {
        assert_eq!(
            tag_values("k_db", "location"),
            "import \"influxdata/influxdb/schema\"\nschema.tagValues(bucket: \"k_db\", tag: \"location\", start: -30d)\n|> sort()"
        );
    }

    #[test]
    fn test_device_lookup_script() {
        let keys = vec!["ksave".to_string(), "device".to_string()];
        let script = device_lookup("k_db", "Ksave01", &keys);

        assert_eq!(
            script,
            "from(bucket: \"k_db\")\n  |> range(start: -1h)\n  |> filter(fn: (r) => r._measurement != \"\" and ((exists r.ksave and r.ksave == \"Ksave01\") or (exists r.device and r.device == \"Ksave01\")))\n  |> last()"
        );
    }

    #[test]
    fn test_device_lookup_escapes_id() {
        let keys = vec!["ksave".to_string()];
        let script = device_lookup("k_db", r#"x") or true or ("#, &keys);
        assert!(script.contains(r#"r.ksave == "x\") or true or (")"#));
    }

    #[test]
    fn test_column_ref_for_odd_keys() {
        assert_eq!(column_ref("host"), "r.host");
        assert_eq!(column_ref("machine-id"), r#"r["machine-id"]"#);
        assert_eq!(column_ref("1st"), r#"r["1st"]"#);
    }
}
