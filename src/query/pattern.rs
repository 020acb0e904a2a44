//! Regex query backend for free-text responses.

use super::{QueryBackend, QueryError, QueryValue};
use regex::Regex;

/// Searches the raw body with a single-capture-group pattern.
pub struct RegexBackend;

impl QueryBackend for RegexBackend {
    fn query(&self, body: &str, query: &str) -> Result<QueryValue, QueryError> {
        query_regex(body, query).map(QueryValue::Text)
    }

    fn name(&self) -> &'static str {
        "regex_backend"
    }
}

/// Return the first capture group of the first match of `pattern` in `text`.
pub fn query_regex(text: &str, pattern: &str) -> Result<String, QueryError> {
    let regex = Regex::new(pattern).map_err(|source| QueryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let caps = regex.captures(text).ok_or_else(|| QueryError::NoMatch {
        pattern: pattern.to_string(),
    })?;

    caps.get(1)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| QueryError::NoCapturingGroup {
            pattern: pattern.to_string(),
        })
}
