//! XML query backend.

use super::{ContentType, QueryBackend, QueryError, QueryValue};
use crate::path::QueryPath;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Minimal element tree: tag name, direct text and child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an element without text or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }
}

/// Parse an XML document into its root element.
pub fn parse_xml(xml: &str) -> Result<XmlElement, QueryError> {
    let decode_error = |reason: String| QueryError::BodyDecode {
        content_type: ContentType::Xml,
        reason,
    };

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            decode_error(format!("at position {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if root.is_some() {
                    return Err(decode_error("multiple root elements".to_string()));
                }
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|err| decode_error(format!("invalid element name: {err}")))?
                    .to_string();
                let element = XmlElement::new(name);

                if matches!(event, Event::Start(_)) {
                    stack.push(element);
                } else {
                    close(&mut stack, &mut root, element);
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| decode_error("unexpected closing tag".to_string()))?;
                close(&mut stack, &mut root, element);
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|err| decode_error(format!("text error: {err}")))?;
                match stack.last_mut() {
                    Some(parent) => parent.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(decode_error("text outside the root element".to_string())),
                }
            }
            Event::CData(ref e) => {
                let text = std::str::from_utf8(e.as_ref())
                    .map_err(|err| decode_error(format!("CDATA error: {err}")))?;
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(text);
                }
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(decode_error(format!("unclosed element <{}>", open.name)));
                }
                break;
            }
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    root.ok_or_else(|| decode_error("no root element".to_string()))
}

fn close(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Parses the body as XML and walks it by tag name.
pub struct XmlBackend;

impl QueryBackend for XmlBackend {
    fn query(&self, body: &str, query: &str) -> Result<QueryValue, QueryError> {
        let path = QueryPath::parse(query)?;
        let root = parse_xml(body)?;
        query_xml(&root, &path).map(QueryValue::Text)
    }

    fn name(&self) -> &'static str {
        "xml_backend"
    }
}

/// Position of the walk: a single element, or the child list it opened.
enum Cursor<'a> {
    Element(&'a XmlElement),
    List(&'a XmlElement, Vec<&'a XmlElement>),
}

/// Resolve `path` inside the tree rooted at `root`.
///
/// Steps alternate between elements and child lists. A step on an element
/// must name that element and may not carry an index; it opens the
/// element's children. A step on a list keeps the children with that tag and
/// picks the 1-based indexed one, or the first. So `<rsp><image><url>` is
/// reached with `rsp.image.image.url`. The walk must end on a leaf, whose
/// text is returned.
pub fn query_xml(root: &XmlElement, path: &QueryPath) -> Result<String, QueryError> {
    let key_not_found = |key: &str| QueryError::KeyNotFound {
        path: path.to_string(),
        key: key.to_string(),
    };

    if path.steps().is_empty() {
        return Err(QueryError::InvalidPath {
            path: path.to_string(),
            reason: "no segments".to_string(),
        });
    }

    let mut cursor = Cursor::Element(root);
    for step in path.steps() {
        cursor = match cursor {
            Cursor::Element(element) => {
                if element.name != step.key {
                    return Err(key_not_found(&step.key));
                }
                if step.index.is_some() {
                    return Err(QueryError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("element <{}> cannot be indexed", step.key),
                    });
                }
                Cursor::List(element, element.children.iter().collect())
            }
            Cursor::List(_, children) => {
                let found: Vec<&XmlElement> =
                    children.into_iter().filter(|c| c.name == step.key).collect();
                if found.is_empty() {
                    return Err(key_not_found(&step.key));
                }
                let index = step.index.unwrap_or(1);
                let len = found.len();
                let element = index
                    .checked_sub(1)
                    .and_then(|i| found.get(i).copied())
                    .ok_or_else(|| QueryError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len,
                    })?;
                Cursor::Element(element)
            }
        };
    }

    let (Cursor::Element(terminal) | Cursor::List(terminal, _)) = cursor;
    if !terminal.children.is_empty() {
        return Err(QueryError::TypeMismatch {
            path: path.to_string(),
            reason: format!("<{}> is not the deepest element", terminal.name),
        });
    }

    Ok(terminal.text.clone())
}
