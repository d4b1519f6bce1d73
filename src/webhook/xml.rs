//! Event-driven XML parsing for CCC webhook payloads.
//!
//! Payloads are parsed without explicit-array normalization: a single child element
//! deserializes as a scalar or nested element, while repeated siblings fold into a
//! [`XmlValue::Sequence`]. Callers must handle both shapes explicitly instead of
//! relying on positional accident.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing a webhook body as XML.
#[derive(Debug, Error)]
pub enum XmlParseError {
    /// Body was not a well-formed XML document.
    #[error("Malformed XML payload: {0}")]
    Malformed(String),
}

/// Parsed XML node: leaf text, repeated siblings, or a nested element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    /// Leaf element containing only character data (possibly empty).
    Scalar(String),
    /// Repeated sibling elements sharing one tag name.
    Sequence(Vec<XmlValue>),
    /// Element with named children.
    Element(BTreeMap<String, XmlValue>),
}

impl XmlValue {
    /// Look up a named child, descending into the first item of a sequence.
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        match self {
            Self::Element(children) => children.get(key),
            Self::Sequence(items) => items.first().and_then(|item| item.get(key)),
            Self::Scalar(_) => None,
        }
    }

    /// Character data carried by this node, taking the first item of a sequence.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(text) => Some(text.as_str()),
            Self::Sequence(items) => items.first().and_then(XmlValue::as_text),
            Self::Element(_) => None,
        }
    }

    /// Convert into a JSON value suitable for audit persistence.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(text) => Value::String(text.clone()),
            Self::Sequence(items) => Value::Array(items.iter().map(XmlValue::to_json).collect()),
            Self::Element(children) => Value::Object(
                children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_json()))
                    .collect(),
            ),
        }
    }
}

/// A parsed XML document: the root element name plus its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Name of the top-level element, used as the webhook event label.
    pub root: String,
    /// Contents of the root element.
    pub value: XmlValue,
}

impl XmlDocument {
    /// Extract the nested `DocumentInfo.DocumentID` identifier, if present and non-empty.
    pub fn document_id(&self) -> Option<String> {
        self.value
            .get("DocumentInfo")?
            .get("DocumentID")?
            .as_text()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
    }
}

struct Frame {
    name: String,
    children: BTreeMap<String, XmlValue>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: BTreeMap::new(),
            text: String::new(),
        }
    }

    fn finish(self) -> (String, XmlValue) {
        let value = if self.children.is_empty() {
            XmlValue::Scalar(self.text)
        } else {
            // Mixed content loses stray text between children; element structure wins.
            XmlValue::Element(self.children)
        };
        (self.name, value)
    }
}

/// Parse the raw webhook body into an [`XmlDocument`].
pub fn parse_document(bytes: &[u8]) -> Result<XmlDocument, XmlParseError> {
    let mut reader = quick_xml::Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<XmlDocument> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlParseError::Malformed(
                        "content after document root".to_string(),
                    ));
                }
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Ok(Event::Empty(empty)) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                let value = XmlValue::Scalar(String::new());
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => {
                        if root.is_some() {
                            return Err(XmlParseError::Malformed(
                                "content after document root".to_string(),
                            ));
                        }
                        root = Some(XmlDocument { root: name, value });
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(frame) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|err| XmlParseError::Malformed(err.to_string()))?;
                    frame.text.push_str(unescaped.as_ref());
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(frame) = stack.last_mut() {
                    frame
                        .text
                        .push_str(String::from_utf8_lossy(cdata.as_ref()).as_ref());
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| XmlParseError::Malformed("unmatched end tag".to_string()))?;
                let (name, value) = frame.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => root = Some(XmlDocument { root: name, value }),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(XmlParseError::Malformed(err.to_string())),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlParseError::Malformed(
            "unexpected end of document".to_string(),
        ));
    }
    root.ok_or_else(|| XmlParseError::Malformed("empty document".to_string()))
}

fn insert_child(children: &mut BTreeMap<String, XmlValue>, name: String, value: XmlValue) {
    match children.get_mut(&name) {
        Some(XmlValue::Sequence(items)) => items.push(value),
        Some(existing) => {
            let first = existing.clone();
            *existing = XmlValue::Sequence(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_name_is_event_label() {
        let doc = parse_document(
            b"<VehicleDamageEstimateAddInvoiceRq><Status>sent</Status></VehicleDamageEstimateAddInvoiceRq>",
        )
        .expect("parse");
        assert_eq!(doc.root, "VehicleDamageEstimateAddInvoiceRq");
    }

    #[test]
    fn extracts_nested_document_id() {
        let doc = parse_document(
            b"<VehicleDamageEstimateAddInvoiceRq><DocumentInfo><DocumentID>EST-1</DocumentID></DocumentInfo></VehicleDamageEstimateAddInvoiceRq>",
        )
        .expect("parse");
        assert_eq!(doc.document_id().as_deref(), Some("EST-1"));
    }

    #[test]
    fn missing_document_id_yields_none() {
        let doc = parse_document(b"<Rq><Other>1</Other></Rq>").expect("parse");
        assert!(doc.document_id().is_none());

        let doc = parse_document(b"<Rq><DocumentInfo><DocumentID>  </DocumentID></DocumentInfo></Rq>")
            .expect("parse");
        assert!(doc.document_id().is_none());
    }

    #[test]
    fn single_child_stays_scalar() {
        let doc = parse_document(b"<Rq><Line>only</Line></Rq>").expect("parse");
        assert_eq!(
            doc.value.get("Line"),
            Some(&XmlValue::Scalar("only".to_string()))
        );
    }

    #[test]
    fn repeated_siblings_fold_into_sequence() {
        let doc = parse_document(b"<Rq><Line>a</Line><Line>b</Line><Line>c</Line></Rq>")
            .expect("parse");
        match doc.value.get("Line") {
            Some(XmlValue::Sequence(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].as_text(), Some("a"));
                assert_eq!(items[2].as_text(), Some("c"));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn document_id_handles_sequence_shape() {
        // Two DocumentInfo siblings: the first one wins.
        let doc = parse_document(
            b"<Rq><DocumentInfo><DocumentID>A</DocumentID></DocumentInfo><DocumentInfo><DocumentID>B</DocumentID></DocumentInfo></Rq>",
        )
        .expect("parse");
        assert_eq!(doc.document_id().as_deref(), Some("A"));
    }

    #[test]
    fn empty_root_parses() {
        let doc = parse_document(b"<A/>").expect("parse");
        assert_eq!(doc.root, "A");
        assert_eq!(doc.value, XmlValue::Scalar(String::new()));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(parse_document(b"<A><B></A>").is_err());
        assert!(parse_document(b"<A>").is_err());
        assert!(parse_document(b"").is_err());
        assert!(parse_document(b"not xml at all").is_err());
    }

    #[test]
    fn converts_to_json_for_audit_storage() {
        let doc = parse_document(
            b"<Rq><DocumentInfo><DocumentID>EST-1</DocumentID></DocumentInfo><Line>a</Line><Line>b</Line></Rq>",
        )
        .expect("parse");
        assert_eq!(
            doc.value.to_json(),
            json!({
                "DocumentInfo": { "DocumentID": "EST-1" },
                "Line": ["a", "b"]
            })
        );
    }
}
