//! Annotated CSV parsing
//!
//! Query results arrive as annotated CSV: `#`-prefixed annotation rows, a
//! header row, then data rows, with blank lines between tables. Each table
//! repeats the header; only the first one is used and repeats are skipped.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One data row keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultRow {
    cells: BTreeMap<String, String>,
}

impl ResultRow {
    /// Cell text, if the column exists
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Cell text, treating an empty cell as absent
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn records(csv_text: &str) -> impl Iterator<Item = StringRecord> + '_ {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes())
        .into_records()
        .filter_map(Result::ok)
}

/// Parse CSV text into rows.
///
/// The first non-annotation line is the header. Rows with fewer cells than
/// the header are dropped. Never fails; malformed input yields fewer rows.
pub fn parse_table(csv_text: &str) -> Vec<ResultRow> {
    let mut records = records(csv_text);

    let header: Vec<String> = match records.next() {
        Some(record) => record.iter().map(str::to_string).collect(),
        None => return Vec::new(),
    };

    records
        .filter(|record| record.len() >= header.len())
        .filter(|record| !record.iter().eq(header.iter().map(String::as_str)))
        .map(|record| ResultRow {
            cells: header
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        })
        .collect()
}

/// Distinct values of the last column, in order of first appearance.
///
/// The header row, empty cells and the literal `value` are excluded.
pub fn parse_value_set(csv_text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    records(csv_text)
        .skip(1)
        .filter_map(|record| record.iter().last().map(str::to_string))
        .filter(|value| !value.is_empty() && value != "value")
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Union of several value sets, keeping first-seen order
pub fn merge_value_sets<I>(sets: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen = HashSet::new();
    sets.into_iter()
        .flatten()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
