//! Element serialization and transform result parsing
//!
//! Elements are handed to transform processors as a small XML document:
//!
//! ```text
//! <paragraph styleId="Title" styleName="Title" align="center">
//!   <run isBold="true">Hello</run>
//! </paragraph>
//! ```
//!
//! Scalar fields and attributes become XML attributes, text becomes a
//! text node, children recurse. All values are escaped by quick-xml.

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use stylemap_ast::Element;

use super::TransformOutput;
use crate::error::TransformError;

/// Tag used when an element type is not a usable XML name
const FALLBACK_TAG: &str = "element";

/// Serialize an element tree to XML
pub fn element_to_xml(element: &Element) -> Result<String, TransformError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, element)?;
    String::from_utf8(writer.into_inner()).map_err(|e| TransformError::Serialization(e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), TransformError> {
    let tag = tag_name(&element.element_type);
    let mut start = BytesStart::new(tag);

    for (name, value) in scalar_attributes(element) {
        if is_xml_name(&name) {
            start.push_attribute((name.as_str(), value.as_str()));
        } else {
            tracing::debug!("Dropped attribute '{}' of <{}>: not an XML name", name, tag);
        }
    }

    let empty = element.text.is_none() && element.children.is_empty();
    if empty {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    if let Some(ref text) = element.text {
        write_event(writer, Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(tag)))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TransformError> {
    writer
        .write_event(event)
        .map_err(|e| TransformError::Serialization(e.to_string()))
}

/// Scalar properties in attribute order: style first, then fields, then
/// the attribute map (which wins on name clashes).
fn scalar_attributes(element: &Element) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    if let Some(ref id) = element.style_id {
        attrs.insert("styleId".to_string(), id.clone());
    }
    if let Some(ref name) = element.style_name {
        attrs.insert("styleName".to_string(), name.clone());
    }
    for (name, value) in element.fields.iter().chain(element.attributes.iter()) {
        if let Some(text) = scalar_text(value) {
            attrs.insert(name.clone(), text);
        }
    }
    attrs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn tag_name(element_type: &str) -> &str {
    if is_xml_name(element_type) {
        element_type
    } else {
        tracing::debug!(
            "Element type '{}' is not an XML name; serialized as <{}>",
            element_type,
            FALLBACK_TAG
        );
        FALLBACK_TAG
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Interpret a transform result as a match decision.
///
/// Accepts a native boolean, a `<result>true</result>` marker anywhere in
/// the text, or the literal strings `true` / `1`. Anything else is `false`.
pub fn parse_match_result(output: &TransformOutput) -> bool {
    match output {
        TransformOutput::Bool(b) => *b,
        TransformOutput::Text(text) => {
            let inner = extract_result_marker(text).unwrap_or(text.as_str());
            let unescaped = quick_xml::escape::unescape(inner)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| inner.to_string());
            matches!(unescaped.trim(), "true" | "1")
        }
    }
}

fn extract_result_marker(text: &str) -> Option<&str> {
    let start = text.find("<result>")? + "<result>".len();
    let end = text[start..].find("</result>")? + start;
    Some(&text[start..end])
}
