//! Field-name filter
//!
//! Rendered as a case-insensitive Flux regex over `r._field`.

use serde::{Deserialize, Serialize};

use crate::query::error::{QueryError, QueryResult};

/// Field tokens matched by the current-values query when none are configured
pub const DEFAULT_FIELD_TOKENS: &[&str] = &["current", "amp", "i", "ia", "ib", "ic"];

/// Validated list of field-name tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldFilter {
    tokens: Vec<String>,
}

impl FieldFilter {
    /// Build a filter; every token must be non-empty `[A-Za-z0-9_]`
    pub fn new<I, S>(tokens: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(Into::into)
            .map(|token: String| {
                if is_safe_token(&token) {
                    Ok(token)
                } else {
                    Err(QueryError::InvalidFilterToken(token))
                }
            })
            .collect::<QueryResult<Vec<_>>>()?;

        if tokens.is_empty() {
            return Err(QueryError::MissingParameter("field filter tokens"));
        }

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// `/(?i)current|amp|i|ia|ib|ic/`
    pub fn to_flux(&self) -> String {
        format!("/(?i){}/", self.tokens.join("|"))
    }
}

impl Default for FieldFilter {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_FIELD_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for FieldFilter {
    type Error = QueryError;

    fn try_from(tokens: Vec<String>) -> QueryResult<Self> {
        Self::new(tokens)
    }
}

impl From<FieldFilter> for Vec<String> {
    fn from(filter: FieldFilter) -> Self {
        filter.tokens
    }
}

fn is_safe_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regex() {
        assert_eq!(FieldFilter::default().to_flux(), "/(?i)current|amp|i|ia|ib|ic/");
    }

    #[test]
    fn test_custom_tokens() {
        let filter = FieldFilter::new(["kWh", "power_before"]).unwrap();
        assert_eq!(filter.to_flux(), "/(?i)kWh|power_before/");
    }

    #[test]
    fn test_unsafe_tokens_rejected() {
        assert_eq!(
            FieldFilter::new(["amp", "a/b"]),
            Err(QueryError::InvalidFilterToken("a/b".to_string()))
        );
        assert!(FieldFilter::new(["a|b"]).is_err());
        assert!(FieldFilter::new([""]).is_err());
        assert!(FieldFilter::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        #[derive(Deserialize)]
        struct Wrapper {
            fields: FieldFilter,
        }

        let ok: Wrapper = toml::from_str(r#"fields = ["ia", "ib"]"#).unwrap();
        assert_eq!(ok.fields.tokens(), ["ia", "ib"]);

        assert!(toml::from_str::<Wrapper>(r#"fields = ["ia)"]"#).is_err());
    }
}
