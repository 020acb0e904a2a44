//! Building the outgoing upload request from a configuration.

use crate::config::{RequestMethod, UploadConfig};
use crate::response::TemplateError;
use crate::substitute::{is_payload_binding, substitute, substitute_all, FieldKind};
use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A fully substituted request, ready for a [`Sender`](crate::sender::Sender).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRequest {
    /// HTTP method
    pub method: RequestMethod,
    /// Request URL including the query string
    pub url: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Form fields; the payload field carries the raw image bytes
    pub form: BTreeMap<String, FormValue>,
}

/// A form field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Bytes(Bytes),
}

impl FormValue {
    /// Text value, if this is not the binary payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    /// Binary payload, if this field carries it.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Text(_) => None,
            Self::Bytes(b) => Some(b),
        }
    }
}

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("bytes", &b.len())?;
                map.end()
            }
        }
    }
}

/// Substitute all request templates of `config` and bind `payload`.
///
/// The configuration is only read; substituted values live in the returned
/// request.
pub fn build_request(config: &UploadConfig, payload: Bytes) -> Result<UploadRequest, TemplateError> {
    let query = substitute_all(
        &config.request_querystring,
        &config.values,
        FieldKind::QueryString,
    )?;
    let headers = substitute_all(&config.request_headers, &config.values, FieldKind::Header)?;

    let mut form = BTreeMap::new();
    for (name, template) in &config.request_formdata {
        let value = if is_payload_binding(template) {
            FormValue::Bytes(payload.clone())
        } else {
            FormValue::Text(substitute(template, &config.values, FieldKind::FormData)?)
        };
        form.insert(name.clone(), value);
    }

    Ok(UploadRequest {
        method: config.request_method,
        url: compose_url(&config.request_url, &query),
        headers,
        form,
    })
}

/// Append an encoded query string to `base`.
fn compose_url(base: &str, query: &BTreeMap<String, String>) -> String {
    if query.is_empty() {
        return base.to_string();
    }

    let query_string = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query_string}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        let mut config = UploadConfig {
            request_url: "http://localhost:80/".to_string(),
            ..Default::default()
        };
        config.values.insert("authToken".to_string(), "abcdef".into());
        config.values.insert("arg1".to_string(), 1i64.into());
        config.values.insert("arg2".to_string(), 2i64.into());
        config
    }

    fn templates() -> BTreeMap<String, String> {
        let mut templates = BTreeMap::new();
        templates.insert("arg".to_string(), "arg=$authToken$".to_string());
        templates.insert("args".to_string(), "arg1=$arg1$;arg2=$arg2$".to_string());
        templates
    }

    #[test]
    fn test_payload_through_formdata() {
        let mut config = config();
        config
            .request_formdata
            .insert("file".to_string(), "$input$".to_string());

        let request = build_request(&config, Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(request.method, RequestMethod::Post);
        assert_eq!(request.url, "http://localhost:80/");
        assert_eq!(
            request.form["file"].as_bytes(),
            Some(&Bytes::from_static(b"abcdef"))
        );
    }

    #[test]
    fn test_values_in_formdata() {
        let mut config = config();
        config.request_formdata = templates();

        let request = build_request(&config, Bytes::new()).unwrap();
        assert_eq!(request.form["arg"].as_text(), Some("arg=abcdef"));
        assert_eq!(request.form["args"].as_text(), Some("arg1=1;arg2=2"));
    }

    #[test]
    fn test_values_in_querystring() {
        let mut config = config();
        config.request_querystring = templates();

        let request = build_request(&config, Bytes::new()).unwrap();
        assert_eq!(
            request.url,
            "http://localhost:80/?arg=arg%3Dabcdef&args=arg1%3D1%3Barg2%3D2"
        );
    }

    #[test]
    fn test_values_in_headers() {
        let mut config = config();
        config.request_headers = templates();

        let request = build_request(&config, Bytes::new()).unwrap();
        assert_eq!(request.headers["arg"], "arg=abcdef");
        assert_eq!(request.headers["args"], "arg1=1;arg2=2");
    }

    #[test]
    fn test_payload_in_querystring_fails() {
        let mut config = config();
        config
            .request_querystring
            .insert("data".to_string(), "$input$".to_string());

        let err = build_request(&config, Bytes::new()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::InvalidPayloadBinding {
                field: FieldKind::QueryString,
                ..
            }
        ));
    }

    #[test]
    fn test_config_is_not_mutated() {
        let mut config = config();
        config.request_headers = templates();
        let before = config.request_headers.clone();

        build_request(&config, Bytes::new()).unwrap();
        assert_eq!(config.request_headers, before);
    }

    #[test]
    fn test_serialize_binary_field() {
        let mut config = config();
        config
            .request_formdata
            .insert("file".to_string(), "$input$".to_string());

        let request = build_request(&config, Bytes::from_static(b"abc")).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "post");
        assert_eq!(json["form"]["file"], serde_json::json!({"bytes": 3}));
    }
}
