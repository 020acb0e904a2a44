//! JSON query backend.

use super::{ContentType, QueryBackend, QueryError, QueryValue};
use crate::path::QueryPath;
use serde_json::Value as JsonValue;

/// Walks a JSON document along a [`QueryPath`].
pub struct JsonBackend;

impl QueryBackend for JsonBackend {
    fn query(&self, body: &str, query: &str) -> Result<QueryValue, QueryError> {
        let path = QueryPath::parse(query)?;
        let json: JsonValue =
            serde_json::from_str(body).map_err(|e| QueryError::BodyDecode {
                content_type: ContentType::Json,
                reason: e.to_string(),
            })?;
        query_json(&json, &path)
    }

    fn name(&self) -> &'static str {
        "json_backend"
    }
}

/// Resolve `path` inside `json`.
///
/// Every step looks a key up in an object; a step with an index then selects
/// the 1-based element of the array found under that key. The final value
/// must be a string or a number.
pub fn query_json(json: &JsonValue, path: &QueryPath) -> Result<QueryValue, QueryError> {
    let mut current = json;

    for step in path.steps() {
        let map = match current {
            JsonValue::Object(map) => map,
            other => {
                return Err(QueryError::TypeMismatch {
                    path: path.to_string(),
                    reason: format!(
                        "cannot look up key {:?} in {}",
                        step.key,
                        kind_of(other)
                    ),
                })
            }
        };

        current = map.get(&step.key).ok_or_else(|| QueryError::KeyNotFound {
            path: path.to_string(),
            key: step.key.clone(),
        })?;

        if let Some(index) = step.index {
            let items = match current {
                JsonValue::Array(items) => items,
                other => {
                    return Err(QueryError::TypeMismatch {
                        path: path.to_string(),
                        reason: format!(
                            "cannot index {:?}, it is {}",
                            step.key,
                            kind_of(other)
                        ),
                    })
                }
            };

            // 1-based
            current = index
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .ok_or_else(|| QueryError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                })?;
        }
    }

    match current {
        JsonValue::String(s) => Ok(QueryValue::Text(s.clone())),
        JsonValue::Number(n) => Ok(QueryValue::Number(n.clone())),
        other => Err(QueryError::TypeMismatch {
            path: path.to_string(),
            reason: format!("result must be a scalar, got {}", kind_of(other)),
        }),
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
