//! Field values and encoding options
//!
//! Two write paths coexist against the same buckets and disagree on how nulls
//! and whole numbers are written. Both behaviours are exposed as explicit
//! options so the caller picks the one its historical schema was built with.

use serde::{Deserialize, Serialize};

use crate::line_protocol::escape::quote;

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `true` / `false`
    Bool(bool),
    /// Any JSON number
    Number(f64),
    /// Free text, written double-quoted
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(other: bool) -> Self {
        Self::Bool(other)
    }
}

impl From<f64> for FieldValue {
    fn from(other: f64) -> Self {
        Self::Number(other)
    }
}

impl From<i64> for FieldValue {
    fn from(other: i64) -> Self {
        Self::Number(other as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(other: &str) -> Self {
        Self::Text(other.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(other: String) -> Self {
        Self::Text(other)
    }
}

/// What to do with a null field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Drop the field from the field set
    #[default]
    Omit,
    /// Write the empty string token `""`
    QuoteEmpty,
}

/// How numbers are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// Whole numbers get the integer marker (`42i`), others are bare decimals
    IntegerSuffix,
    /// Always a bare decimal (`42`), so a field never flips between integer and float
    #[default]
    Float,
}

/// Field encoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodingOptions {
    #[serde(default)]
    pub nulls: NullPolicy,
    #[serde(default)]
    pub numbers: NumberFormat,
}

impl EncodingOptions {
    /// Options of the generic write endpoint: nulls omitted, numbers as floats
    pub const fn generic_write() -> Self {
        Self {
            nulls: NullPolicy::Omit,
            numbers: NumberFormat::Float,
        }
    }

    /// Options of machine registration: nulls quoted, whole numbers as integers
    pub const fn registration() -> Self {
        Self {
            nulls: NullPolicy::QuoteEmpty,
            numbers: NumberFormat::IntegerSuffix,
        }
    }

    /// Encode a possibly-null field value.
    ///
    /// Returns `None` when the field must be left out of the line.
    pub fn encode(&self, value: Option<&FieldValue>) -> Option<String> {
        match value {
            None => match self.nulls {
                NullPolicy::Omit => None,
                NullPolicy::QuoteEmpty => Some("\"\"".to_string()),
            },
            Some(FieldValue::Bool(b)) => Some(if *b { "true" } else { "false" }.to_string()),
            Some(FieldValue::Number(n)) => Some(format_number(*n, self.numbers)),
            Some(FieldValue::Text(s)) => Some(quote(s)),
        }
    }
}

/// Largest magnitude that still converts to `i64` without saturating
const I64_LIMIT: f64 = 9_223_372_036_854_775_807.0;

fn format_number(n: f64, format: NumberFormat) -> String {
    match format {
        NumberFormat::IntegerSuffix if is_whole(n) => format!("{}i", n as i64),
        _ => format!("{}", n),
    }
}

fn is_whole(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < I64_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool() {
        let options = EncodingOptions::generic_write();
        assert_eq!(options.encode(Some(&true.into())).as_deref(), Some("true"));
        assert_eq!(options.encode(Some(&false.into())).as_deref(), Some("false"));
    }

    #[test]
    fn test_numbers_as_float() {
        let options = EncodingOptions::generic_write();
        assert_eq!(options.encode(Some(&42_i64.into())).as_deref(), Some("42"));
        assert_eq!(options.encode(Some(&1.5.into())).as_deref(), Some("1.5"));
        assert_eq!(options.encode(Some(&(-3.0).into())).as_deref(), Some("-3"));
    }

    #[test]
    fn test_numbers_with_integer_suffix() {
        let options = EncodingOptions::registration();
        assert_eq!(options.encode(Some(&42_i64.into())).as_deref(), Some("42i"));
        assert_eq!(options.encode(Some(&120.0.into())).as_deref(), Some("120i"));
        assert_eq!(options.encode(Some(&0.25.into())).as_deref(), Some("0.25"));
        assert_eq!(options.encode(Some(&1e300.into())).map(|s| s.ends_with('i')), Some(false));
    }

    #[test]
    fn test_text_is_quoted() {
        let options = EncodingOptions::generic_write();
        assert_eq!(
            options.encode(Some(&r#"a "b""#.into())).as_deref(),
            Some(r#""a \"b\"""#)
        );
    }

    #[test]
    fn test_null_policies() {
        assert_eq!(EncodingOptions::generic_write().encode(None), None);
        assert_eq!(EncodingOptions::registration().encode(None).as_deref(), Some("\"\""));
    }

    #[test]
    fn test_options_deserialize() {
        let options: EncodingOptions =
            toml::from_str("nulls = \"quote_empty\"\nnumbers = \"integer_suffix\"").unwrap();
        assert_eq!(options, EncodingOptions::registration());

        let options: EncodingOptions = toml::from_str("").unwrap();
        assert_eq!(options, EncodingOptions::generic_write());
    }
}
