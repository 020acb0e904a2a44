//! Configuration types for upload providers.

use crate::response::QueryTemplate;
use crate::substitute::{substitute, FieldKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Reserved value key that binds the raw image bytes into a formdata field.
///
/// Only a formdata template consisting of exactly `$input$` may reference it.
pub const PAYLOAD_KEY: &str = "input";

/// Declarative description of how to upload to one provider and how to read
/// the result URLs back out of its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Provider display name (for logging)
    pub name: String,
    /// Base URL without a query string
    pub request_url: String,
    /// HTTP method
    pub request_method: RequestMethod,
    /// Values available to `$key$` substitution
    pub values: BTreeMap<String, ScalarValue>,
    /// Query string templates
    pub request_querystring: BTreeMap<String, String>,
    /// Header templates
    pub request_headers: BTreeMap<String, String>,
    /// Form field templates
    pub request_formdata: BTreeMap<String, String>,
    /// Query template for the image URL
    pub image_url_querystr: String,
    /// Query template for the thumbnail URL
    pub thumbnail_url_querystr: String,
    /// Query template for the delete URL
    pub delete_url_querystr: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            request_url: String::new(),
            request_method: RequestMethod::default(),
            values: BTreeMap::new(),
            request_querystring: BTreeMap::new(),
            request_headers: BTreeMap::new(),
            request_formdata: BTreeMap::new(),
            image_url_querystr: String::new(),
            thumbnail_url_querystr: String::new(),
            delete_url_querystr: String::new(),
        }
    }
}

impl UploadConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file, choosing the format by extension.
    ///
    /// `.yaml` and `.yml` are read as YAML, anything else as JSON.
    pub async fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Statically check the configuration.
    ///
    /// Query-time errors are still raised when templates are evaluated; this
    /// only lets callers reject obviously broken records up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let raw = self.request_url.as_str();
        let url = url::Url::parse(raw).map_err(|e| {
            ConfigError::Invalid(format!("request_url {raw:?} is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "request_url {raw:?} must use http or https"
            )));
        }
        if !matches!(url.host_str(), Some(host) if !host.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "request_url {raw:?} has no host"
            )));
        }
        if url.query().is_some() {
            return Err(ConfigError::Invalid(format!(
                "request_url {raw:?} must not embed a query string, use request_querystring"
            )));
        }

        if self.values.contains_key(PAYLOAD_KEY) {
            return Err(ConfigError::Invalid(format!(
                "values must not define the reserved key {PAYLOAD_KEY:?}"
            )));
        }

        let no_values = BTreeMap::new();
        let fields = [
            (FieldKind::QueryString, &self.request_querystring),
            (FieldKind::Header, &self.request_headers),
            (FieldKind::FormData, &self.request_formdata),
        ];
        for (kind, templates) in fields {
            for (name, template) in templates {
                substitute(template, &no_values, kind).map_err(|e| {
                    ConfigError::Invalid(format!("{kind} field {name:?}: {e}"))
                })?;
            }
        }

        let queries = [
            ("image_url_querystr", &self.image_url_querystr),
            ("thumbnail_url_querystr", &self.thumbnail_url_querystr),
            ("delete_url_querystr", &self.delete_url_querystr),
        ];
        for (field, template) in queries {
            if template.is_empty() {
                continue;
            }
            QueryTemplate::parse(template)
                .and_then(|t| t.check())
                .map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))?;
        }

        Ok(())
    }
}

/// HTTP method used for the upload request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl RequestMethod {
    /// Upper-case method token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            other => Err(ConfigError::Invalid(format!(
                "unsupported request method {other:?}"
            ))),
        }
    }
}

impl Serialize for RequestMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str().to_ascii_lowercase())
    }
}

impl<'de> Deserialize<'de> for RequestMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A user supplied substitution value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl TryFrom<f64> for ScalarValue {
    type Error = ConfigError;

    fn try_from(n: f64) -> Result<Self, Self::Error> {
        serde_json::Number::from_f64(n)
            .map(Self::Number)
            .ok_or_else(|| ConfigError::Invalid(format!("{n} is not a finite number")))
    }
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sm_ms() -> UploadConfig {
        UploadConfig::from_yaml(
            r#"
name: sm.ms
request_url: "https://sm.ms/api/upload"
request_querystring:
  ssl: "true"
  format: json
request_formdata:
  smfile: "$input$"
image_url_querystr: "$json:data.url$"
delete_url_querystr: "$json:data.delete$"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.request_method, RequestMethod::Post);
        assert!(config.values.is_empty());
        assert!(config.image_url_querystr.is_empty());
    }

    #[test]
    fn test_config_parsing() {
        let config = sm_ms();
        assert_eq!(config.name, "sm.ms");
        assert_eq!(config.request_method, RequestMethod::Post);
        assert_eq!(config.request_querystring.len(), 2);
        assert_eq!(config.request_formdata["smfile"], "$input$");
        assert!(config.thumbnail_url_querystr.is_empty());
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let config = UploadConfig::from_json(r#"{"request_method": "GeT"}"#).unwrap();
        assert_eq!(config.request_method, RequestMethod::Get);

        assert!(UploadConfig::from_json(r#"{"request_method": "brew"}"#).is_err());
    }

    #[test]
    fn test_scalar_values() {
        let config = UploadConfig::from_json(
            r#"{"values": {"token": "abc", "count": 3, "ratio": 1.5, "whole": 2.0, "flag": true}}"#,
        )
        .unwrap();
        assert_eq!(config.values["token"].to_string(), "abc");
        assert_eq!(config.values["count"].to_string(), "3");
        assert_eq!(config.values["ratio"].to_string(), "1.5");
        assert_eq!(config.values["whole"].to_string(), "2.0");
        assert_eq!(config.values["flag"].to_string(), "true");
    }

    #[test]
    fn test_validate_accepts_good_config() {
        sm_ms().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_payload_in_header() {
        let mut config = sm_ms();
        config
            .request_headers
            .insert("X-Data".to_string(), "$input$".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_value() {
        let mut config = sm_ms();
        config.values.insert(PAYLOAD_KEY.to_string(), "x".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_query_templates() {
        let mut config = sm_ms();
        config.image_url_querystr = "$toml:data.url$".to_string();
        assert!(config.validate().is_err());

        let mut config = sm_ms();
        config.delete_url_querystr = "$regex:(unclosed$".to_string();
        assert!(config.validate().is_err());

        let mut config = sm_ms();
        config.thumbnail_url_querystr = "no token here".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_embedded_query() {
        let mut config = sm_ms();
        config.request_url = "https://sm.ms/api/upload?ssl=true".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_urls() {
        for url in [
            "http://",
            "https://exa mple.com/upload",
            "sm.ms/api/upload",
            "ftp://sm.ms/api/upload",
            "https://sm.ms/api/upload?",
        ] {
            let mut config = sm_ms();
            config.request_url = url.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{url:?} was accepted"
            );
        }
    }

    #[test]
    fn test_validate_rejects_url_without_host() {
        for url in ["http://", "http://:8080/upload"] {
            let mut config = sm_ms();
            config.request_url = url.to_string();
            assert!(config.validate().is_err(), "{url:?} was accepted");
        }
    }

    #[tokio::test]
    async fn test_from_path_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("provider.yaml");
        tokio::fs::write(&yaml_path, "name: yaml-provider\n")
            .await
            .unwrap();
        let config = UploadConfig::from_path(&yaml_path).await.unwrap();
        assert_eq!(config.name, "yaml-provider");

        let json_path = dir.path().join("provider.json");
        tokio::fs::write(&json_path, r#"{"name": "json-provider"}"#)
            .await
            .unwrap();
        let config = UploadConfig::from_path(&json_path).await.unwrap();
        assert_eq!(config.name, "json-provider");
    }
}
