//! Path grammar for JSON and XML queries.
//!
//! A path is a run of segments such as `data.urls[2]`, where each segment is a
//! key optionally followed by a 1-based `[index]`. Dots and whitespace only
//! separate keys; `data.urls[1]` and `data urls[1]` address the same value.

use crate::query::QueryError;
use std::fmt;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Object key or element tag
    pub key: String,
    /// 1-based array/sibling index
    pub index: Option<usize>,
}

/// A parsed query path, keeping the source text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPath {
    source: String,
    steps: Vec<PathStep>,
}

impl QueryPath {
    /// Parse a path string.
    pub fn parse(path: &str) -> Result<Self, QueryError> {
        let invalid = |reason: String| QueryError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        let mut steps: Vec<PathStep> = Vec::new();
        let mut key = String::new();
        let mut chars = path.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '[' => {
                    if key.is_empty() {
                        return Err(invalid(format!("index at offset {pos} has no key")));
                    }

                    let mut digits = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        digits.push(c);
                    }
                    if !closed {
                        return Err(invalid(format!("unclosed '[' at offset {pos}")));
                    }
                    if digits.is_empty() || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(invalid(format!("index {digits:?} is not a number")));
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| invalid(format!("index {digits} is too large")))?;
                    if index == 0 {
                        return Err(invalid("the index should start at 1".to_string()));
                    }

                    steps.push(PathStep {
                        key: std::mem::take(&mut key),
                        index: Some(index),
                    });
                }
                ']' => return Err(invalid(format!("unexpected ']' at offset {pos}"))),
                c if c == '.' || c.is_whitespace() => {
                    if !key.is_empty() {
                        steps.push(PathStep {
                            key: std::mem::take(&mut key),
                            index: None,
                        });
                    }
                }
                c => key.push(c),
            }
        }

        if !key.is_empty() {
            steps.push(PathStep { key, index: None });
        }

        if steps.is_empty() {
            return Err(invalid("no segments".to_string()));
        }

        Ok(Self {
            source: path.to_string(),
            steps,
        })
    }

    /// The parsed steps, in order.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The original path text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for QueryPath {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
