//! Points and the line builder
//!
//! A [`Point`] is one telemetry sample. [`Point::encode`] turns it into an
//! [`EncodedLine`]:
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...][ timestamp]
//! ```
//!
//! Tags and fields are kept in `BTreeMap`s so the output order is stable.

use std::collections::BTreeMap;
use std::fmt;

use crate::line_protocol::error::{LineError, LineResult};
use crate::line_protocol::escape::{escape, unescape, unquote, Role};
use crate::line_protocol::value::{EncodingOptions, FieldValue};

/// One telemetry sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    /// Measurement name
    pub measurement: String,
    /// Indexed string dimensions
    pub tags: BTreeMap<String, String>,
    /// Field values; `None` is a JSON null
    pub fields: BTreeMap<String, Option<FieldValue>>,
    /// Epoch seconds
    pub timestamp: Option<i64>,
}

impl Point {
    /// Create an empty point for a measurement
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            ..Default::default()
        }
    }

    /// Builder method: set a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder method: set a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// Builder method: set a null field
    pub fn null_field(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), None);
        self
    }

    /// Builder method: set the timestamp (epoch seconds)
    pub fn timestamp(mut self, seconds: i64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    /// Encode this point as one wire line
    pub fn encode(&self, options: &EncodingOptions) -> LineResult<EncodedLine> {
        if self.measurement.is_empty() {
            return Err(LineError::EmptyMeasurement);
        }

        // A null-only point would encode to `m k=` or to placeholder strings only.
        if !self.fields.values().any(Option::is_some) {
            return Err(LineError::EmptyFields);
        }

        let mut line = escape(&self.measurement, Role::Measurement);

        // The wire format has no representation for empty tag keys or values.
        for (key, value) in self.tags.iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
            line.push(',');
            line.push_str(&escape(key, Role::TagKey));
            line.push('=');
            line.push_str(&escape(value, Role::TagValue));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                options
                    .encode(value.as_ref())
                    .map(|encoded| format!("{}={}", escape(key, Role::FieldKey), encoded))
            })
            .collect();

        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(ts) = self.timestamp {
            line.push(' ');
            line.push_str(&ts.to_string());
        }

        Ok(EncodedLine(line))
    }
}

/// The wire form of one point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLine(String);

impl EncodedLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EncodedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point dropped from a batch
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPoint {
    /// Position of the point in the request
    pub index: usize,
    pub error: LineError,
}

/// Encoded lines of a batch plus the points that were dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub lines: Vec<EncodedLine>,
    pub rejected: Vec<RejectedPoint>,
}

impl Batch {
    /// Newline-delimited request body
    pub fn body(&self) -> String {
        self.lines
            .iter()
            .map(EncodedLine::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of lines that will be written
    pub fn written(&self) -> usize {
        self.lines.len()
    }
}

/// Encode a sequence of points.
///
/// Points that fail to decode or encode are dropped and recorded in
/// [`Batch::rejected`]; the batch itself fails only when no line is left.
pub fn encode_batch<I>(points: I, options: &EncodingOptions) -> LineResult<Batch>
where
    I: IntoIterator<Item = LineResult<Point>>,
{
    let mut batch = Batch::default();

    for (index, point) in points.into_iter().enumerate() {
        match point.and_then(|p| p.encode(options)) {
            Ok(line) => batch.lines.push(line),
            Err(error) => batch.rejected.push(RejectedPoint { index, error }),
        }
    }

    if batch.lines.is_empty() {
        return Err(LineError::NoValidPoints);
    }

    Ok(batch)
}

/// Decode one wire line back into a [`Point`].
///
/// Integer fields come back as [`FieldValue::Number`]; the integer marker is a
/// property of the encoding options, not of the value.
pub fn decode_line(line: &str) -> LineResult<Point> {
    let malformed = || LineError::Malformed(line.to_string());

    let (head, rest) = split_once_unescaped(line, ' ', false).ok_or_else(malformed)?;
    let sections = split_unescaped(rest, ' ', true);
    let (fields, timestamp) = match sections.as_slice() {
        [fields] => (*fields, None),
        [fields, ts] => (*fields, Some(ts.parse::<i64>().map_err(|_| malformed())?)),
        _ => return Err(malformed()),
    };

    let mut head_parts = split_unescaped(head, ',', false).into_iter();
    let measurement = unescape(head_parts.next().unwrap_or_default(), Role::Measurement);
    let mut point = Point::new(measurement);
    point.timestamp = timestamp;

    for pair in head_parts {
        let (key, value) = split_once_unescaped(pair, '=', false).ok_or_else(malformed)?;
        point
            .tags
            .insert(unescape(key, Role::TagKey), unescape(value, Role::TagValue));
    }

    for pair in split_unescaped(fields, ',', true) {
        let (key, raw) = split_once_unescaped(pair, '=', false).ok_or_else(malformed)?;
        let value = decode_field_value(raw).ok_or_else(malformed)?;
        point.fields.insert(unescape(key, Role::FieldKey), Some(value));
    }

    if point.fields.is_empty() {
        return Err(LineError::EmptyFields);
    }

    Ok(point)
}

fn decode_field_value(raw: &str) -> Option<FieldValue> {
    if raw.starts_with('"') {
        return unquote(raw).map(FieldValue::Text);
    }

    match raw {
        "t" | "T" | "true" | "True" | "TRUE" => return Some(FieldValue::Bool(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Some(FieldValue::Bool(false)),
        _ => {}
    }

    if let Some(int) = raw.strip_suffix('i').or_else(|| raw.strip_suffix('u')) {
        return int.parse::<i64>().ok().map(FieldValue::from);
    }

    raw.parse::<f64>().ok().map(FieldValue::Number)
}

/// Split on `delim` where it is not backslash-escaped (and, when
/// `quotes` is set, not inside a double-quoted string).
fn split_unescaped(s: &str, delim: char, quotes: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut in_quotes = false;

    for (idx, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if quotes => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }

    parts.push(&s[start..]);
    parts
}

fn split_once_unescaped(s: &str, delim: char, quotes: bool) -> Option<(&str, &str)> {
    let first = split_unescaped(s, delim, quotes).into_iter().next()?;
    if first.len() == s.len() {
        return None;
    }
    Some((first, &s[first.len() + delim.len_utf8()..]))
}
