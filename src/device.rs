//! Device Alias Resolution
//!
//! Field devices report under several identifier schemes. The resolver maps a
//! raw identifier to the canonical `KsaveNN` form used by the dashboard:
//!
//! 1. exact match in the configured [`AliasTable`]
//! 2. `DEV-<digits>` becomes `Ksave<digits>`, zero-padded to two places
//! 3. anything else passes through unchanged

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Static raw-id to canonical-id table, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `{"raw": "canonical"}` pairs
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Add entries from another table; existing keys are overwritten
    pub fn extend(&mut self, other: AliasTable) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(raw).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AliasTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Resolves raw device identifiers to canonical ones
#[derive(Debug, Clone, Default)]
pub struct DeviceResolver {
    aliases: Arc<AliasTable>,
}

impl DeviceResolver {
    pub fn new(aliases: Arc<AliasTable>) -> Self {
        Self { aliases }
    }

    /// Resolve a raw identifier
    pub fn resolve(&self, raw: &str) -> String {
        if let Some(canonical) = self.aliases.get(raw) {
            return canonical.to_string();
        }

        pattern_alias(raw).unwrap_or_else(|| raw.to_string())
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }
}

/// `DEV-7` -> `Ksave07`, `DEV-0012` -> `Ksave12`
fn pattern_alias(raw: &str) -> Option<String> {
    let prefix = raw.get(..4)?;
    if !prefix.eq_ignore_ascii_case("DEV-") {
        return None;
    }

    let digits = &raw[4..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let trimmed = digits.trim_start_matches('0');
    let number = if trimmed.is_empty() { "0" } else { trimmed };
    Some(format!("Ksave{:0>2}", number))
}
