//! `$key$` value substitution for request templates.

use crate::config::{ScalarValue, PAYLOAD_KEY};
use crate::response::TemplateError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Regex for matching substitution tokens like $key$
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([^$]+)\$").unwrap());

static PAYLOAD_TOKEN: LazyLock<String> = LazyLock::new(|| format!("${PAYLOAD_KEY}$"));

/// Which part of the request a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    QueryString,
    Header,
    FormData,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::QueryString => "querystring",
            Self::Header => "header",
            Self::FormData => "formdata",
        })
    }
}

/// Whether a formdata template binds the raw payload bytes.
pub fn is_payload_binding(template: &str) -> bool {
    template
        .strip_prefix('$')
        .and_then(|t| t.strip_suffix('$'))
        .is_some_and(|key| key == PAYLOAD_KEY)
}

/// Replace every `$key$` in `template` with the matching entry of `values`.
///
/// Unknown keys are left in place. The payload token is rejected wherever it
/// appears, even next to stray `$` signs, unless `kind` is
/// [`FieldKind::FormData`] and the template is exactly the payload token; in
/// that case the template comes back unchanged for the caller to bind.
pub fn substitute(
    template: &str,
    values: &BTreeMap<String, ScalarValue>,
    kind: FieldKind,
) -> Result<String, TemplateError> {
    if template.contains(PAYLOAD_TOKEN.as_str()) {
        if kind == FieldKind::FormData && is_payload_binding(template) {
            return Ok(template.to_string());
        }
        return Err(TemplateError::InvalidPayloadBinding {
            field: kind,
            template: template.to_string(),
        });
    }

    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TOKEN_REGEX.captures_iter(template) {
        let (Some(token), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        output.push_str(&template[last..token.start()]);
        last = token.end();

        match values.get(key.as_str()) {
            Some(value) => output.push_str(&value.to_string()),
            None => output.push_str(token.as_str()),
        }
    }

    output.push_str(&template[last..]);
    Ok(output)
}

/// Apply [`substitute`] to every template of a field map.
pub fn substitute_all(
    templates: &BTreeMap<String, String>,
    values: &BTreeMap<String, ScalarValue>,
    kind: FieldKind,
) -> Result<BTreeMap<String, String>, TemplateError> {
    templates
        .iter()
        .map(|(name, template)| Ok((name.clone(), substitute(template, values, kind)?)))
        .collect()
}
