//! Response query templates.
//!
//! A query template is literal text around at most one `$type:query$` token,
//! for example `https://host/$json:data.id$.png`. Evaluating it against a
//! response body runs the query with the backend named by `type` and splices
//! the result between the literal prefix and suffix.

use crate::config::UploadConfig;
use crate::path::QueryPath;
use crate::query::{ContentType, QueryError};
use crate::substitute::FieldKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::trace;

/// Regex for matching a query token like $json:data.url$
///
/// The body is captured up to the last `$` so regex queries may use `$`
/// anchors; path queries are cut back to their first `$` in [`QueryTemplate::parse`].
static QUERY_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$([^\s:$]+):(.*)\$").unwrap());

/// A parsed query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    /// Literal text before the token
    pub prefix: String,
    /// Backend selector
    pub content_type: ContentType,
    /// Path or pattern handed to the backend
    pub query: String,
    /// Literal text after the token
    pub suffix: String,
}

impl QueryTemplate {
    /// Parse a non-empty template.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let caps = QUERY_TOKEN_REGEX
            .captures(template)
            .ok_or_else(|| TemplateError::InvalidTemplate {
                template: template.to_string(),
            })?;
        let (Some(token), Some(tag), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            return Err(TemplateError::InvalidTemplate {
                template: template.to_string(),
            });
        };

        let content_type = ContentType::from_tag(tag.as_str()).ok_or_else(|| {
            TemplateError::UnsupportedContentType {
                content_type: tag.as_str().to_string(),
                template: template.to_string(),
            }
        })?;

        // Paths never contain `$`, so a path token closes at its first one.
        let mut query = body.as_str();
        let mut suffix_start = token.end();
        if content_type != ContentType::Regex {
            if let Some(end) = query.find('$') {
                query = &query[..end];
                suffix_start = body.start() + end + 1;
            }
        }

        Ok(Self {
            prefix: template[..token.start()].to_string(),
            content_type,
            query: query.to_string(),
            suffix: template[suffix_start..].to_string(),
        })
    }

    /// Check that the query itself is well formed without a response body.
    pub fn check(&self) -> Result<(), TemplateError> {
        match self.content_type {
            ContentType::Json | ContentType::Xml => {
                QueryPath::parse(&self.query)?;
            }
            ContentType::Regex => {
                Regex::new(&self.query).map_err(|source| QueryError::InvalidPattern {
                    pattern: self.query.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Run the query against `body` and splice the result into the template.
    pub fn evaluate(&self, body: &str) -> Result<String, TemplateError> {
        let value = self.content_type.query(body, &self.query)?;
        trace!(
            content_type = %self.content_type,
            query = %self.query,
            value = %value,
            "Query resolved"
        );
        Ok(format!("{}{}{}", self.prefix, value, self.suffix))
    }
}

/// Evaluate a query template against a response body.
///
/// An empty template yields an empty string.
pub fn resolve(template: &str, body: &str) -> Result<String, TemplateError> {
    if template.is_empty() {
        return Ok(String::new());
    }
    QueryTemplate::parse(template)?.evaluate(body)
}

/// URLs extracted from an upload response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedUrls {
    pub image_url: String,
    pub thumbnail_url: String,
    pub delete_url: String,
}

/// Evaluate the three query templates of `config` against `body`.
///
/// Stops at the first failing field.
pub fn query_response(config: &UploadConfig, body: &str) -> Result<ExtractedUrls, ResponseError> {
    let extract = |field: &'static str, template: &str| {
        resolve(template, body).map_err(|source| ResponseError { field, source })
    };

    Ok(ExtractedUrls {
        image_url: extract("image_url", &config.image_url_querystr)?,
        thumbnail_url: extract("thumbnail_url", &config.thumbnail_url_querystr)?,
        delete_url: extract("delete_url", &config.delete_url_querystr)?,
    })
}

/// Errors raised while expanding request or response templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {template:?} contains no $type:query$ token")]
    InvalidTemplate { template: String },

    #[error("unsupported content type {content_type:?} in template {template:?}")]
    UnsupportedContentType {
        content_type: String,
        template: String,
    },

    #[error("{field} template {template:?} may not reference the payload key")]
    InvalidPayloadBinding { field: FieldKind, template: String },

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// A template failure tagged with the result field it was evaluated for.
#[derive(Debug, thiserror::Error)]
#[error("failed to extract {field}: {source}")]
pub struct ResponseError {
    pub field: &'static str,
    #[source]
    pub source: TemplateError,
}
