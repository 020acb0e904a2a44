//! Query backends that extract a single scalar from a response body.

mod json;
mod pattern;
mod xml;

pub use json::{query_json, JsonBackend};
pub use pattern::{query_regex, RegexBackend};
pub use xml::{parse_xml, query_xml, XmlBackend, XmlElement};

use std::fmt;

/// A backend that decodes a raw response body and evaluates a query on it.
pub trait QueryBackend: Send + Sync {
    /// Evaluate `query` against the raw `body`.
    fn query(&self, body: &str, query: &str) -> Result<QueryValue, QueryError>;

    /// Get the backend name for debugging.
    fn name(&self) -> &'static str;
}

/// Content type tag of a query token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Xml,
    Regex,
}

impl ContentType {
    /// Look up a content type by its token name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }

    /// Token name of this content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Regex => "regex",
        }
    }

    /// The backend serving this content type.
    pub fn backend(&self) -> &'static dyn QueryBackend {
        match self {
            Self::Json => &JsonBackend,
            Self::Xml => &XmlBackend,
            Self::Regex => &RegexBackend,
        }
    }

    /// Decode `body` and evaluate `query` with the matching backend.
    pub fn query(&self, body: &str, query: &str) -> Result<QueryValue, QueryError> {
        self.backend().query(body, query)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar extracted by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Errors raised while evaluating a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query path {path:?} is invalid: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("query path {path:?} is invalid: key {key:?} does not exist")]
    KeyNotFound { path: String, key: String },

    #[error("query path {path:?} is invalid: index {index} out of range (1..={len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("query path {path:?} is invalid: {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("response body is not valid {content_type}: {reason}")]
    BodyDecode {
        content_type: ContentType,
        reason: String,
    },

    #[error("query regex pattern {pattern:?} is invalid: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("query regex pattern {pattern:?} matched nothing")]
    NoMatch { pattern: String },

    #[error("query regex pattern {pattern:?} has no capturing group that matched")]
    NoCapturingGroup { pattern: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_tags() {
        assert_eq!(ContentType::from_tag("json"), Some(ContentType::Json));
        assert_eq!(ContentType::from_tag("xml"), Some(ContentType::Xml));
        assert_eq!(ContentType::from_tag("regex"), Some(ContentType::Regex));
        assert_eq!(ContentType::from_tag("JSON"), None);
        assert_eq!(ContentType::from_tag("yaml"), None);
    }

    #[test]
    fn test_backend_dispatch() {
        assert_eq!(ContentType::Json.backend().name(), "json_backend");
        assert_eq!(ContentType::Xml.backend().name(), "xml_backend");
        assert_eq!(ContentType::Regex.backend().name(), "regex_backend");

        let value = ContentType::Json.query(r#"{"id": 7}"#, "id").unwrap();
        assert_eq!(value.to_string(), "7");

        let value = ContentType::Xml.query("<r><id>7</id></r>", "r.id").unwrap();
        assert_eq!(value, QueryValue::from("7"));

        let value = ContentType::Regex.query("id=7;", r"id=(\d+)").unwrap();
        assert_eq!(value, QueryValue::from("7"));
    }

    #[test]
    fn test_decode_errors_name_content_type() {
        let err = ContentType::Json.query(r#"{"id":1"#, "id").unwrap_err();
        assert!(matches!(
            err,
            QueryError::BodyDecode {
                content_type: ContentType::Json,
                ..
            }
        ));
        assert!(err.to_string().contains("json"));
    }
}
