//! Document elements
//!
//! An [`Element`] is one node of the document tree: a paragraph, a run,
//! a break, a table, or any domain-specific node a document reader emits.
//! Known fields (`type`, `styleId`, `styleName`, `attributes`, `children`,
//! `text`) are typed; everything else lands in [`Element::fields`] and is
//! treated opaquely.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Element tag (e.g. "paragraph", "run", "break")
    #[serde(rename = "type")]
    pub element_type: String,

    /// Style ID from the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,

    /// Human-readable style name from the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,

    /// Free-form attribute map
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,

    /// Ordered child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,

    /// Text content, for text-bearing elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Domain-specific fields (`breakType`, `isBold`, `highlight`, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Element {
    /// Create an element with the given tag
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            ..Default::default()
        }
    }

    /// Create a paragraph element
    pub fn paragraph() -> Self {
        Self::new("paragraph")
    }

    /// Create a run element
    pub fn run() -> Self {
        Self::new("run")
    }

    /// Create a table element
    pub fn table() -> Self {
        Self::new("table")
    }

    /// Create a break element of the given kind ("line", "page", ...)
    pub fn break_of(kind: &str) -> Self {
        Self::new("break").with_field("breakType", kind)
    }

    /// Create a text element
    pub fn text_node(text: impl Into<String>) -> Self {
        Self::new("text").with_text(text)
    }

    /// Set the style ID
    pub fn with_style_id(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    /// Set the style name
    pub fn with_style_name(mut self, style_name: impl Into<String>) -> Self {
        self.style_name = Some(style_name.into());
        self
    }

    /// Set an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set a domain-specific field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Check the element tag
    pub fn is(&self, element_type: &str) -> bool {
        self.element_type == element_type
    }

    /// Look up a domain-specific field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a string-valued field
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Look up a boolean field, treating absence as `false`
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Look up any property by name.
    ///
    /// Typed fields are addressed by their serialized names (`type`,
    /// `styleId`, `styleName`, `text`); anything else is looked up in
    /// [`Element::fields`].
    pub fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "type" => Some(Cow::Owned(Value::String(self.element_type.clone()))),
            "styleId" => self
                .style_id
                .as_ref()
                .map(|s| Cow::Owned(Value::String(s.clone()))),
            "styleName" => self
                .style_name
                .as_ref()
                .map(|s| Cow::Owned(Value::String(s.clone()))),
            "text" => self
                .text
                .as_ref()
                .map(|s| Cow::Owned(Value::String(s.clone()))),
            other => self.fields.get(other).map(Cow::Borrowed),
        }
    }

    /// Concatenated text of this element and all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for element in self.walk() {
            if let Some(ref text) = element.text {
                out.push_str(text);
            }
        }
        out
    }

    /// Depth-first, pre-order iterator over this element and its descendants
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Pre-order iterator returned by [`Element::walk`]
pub struct Walk<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let el = Element::paragraph()
            .with_style_id("Heading1")
            .with_style_name("Heading 1")
            .with_attribute("align", "center")
            .with_child(Element::run().with_text("Hello"));

        assert!(el.is("paragraph"));
        assert_eq!(el.style_id.as_deref(), Some("Heading1"));
        assert_eq!(el.attribute("align"), Some(&json!("center")));
        assert_eq!(el.children.len(), 1);
    }

    #[test]
    fn test_property_lookup() {
        let el = Element::break_of("page").with_style_name("Body");

        assert_eq!(el.property("type").unwrap().as_ref(), &json!("break"));
        assert_eq!(el.property("breakType").unwrap().as_ref(), &json!("page"));
        assert_eq!(el.property("styleName").unwrap().as_ref(), &json!("Body"));
        assert!(el.property("styleId").is_none());
        assert!(el.property("missing").is_none());
    }

    #[test]
    fn test_deserialize_flattened_fields() {
        let el: Element = serde_json::from_value(json!({
            "type": "run",
            "styleId": "Strong",
            "isBold": true,
            "children": [{"type": "text", "text": "hi"}]
        }))
        .unwrap();

        assert_eq!(el.element_type, "run");
        assert_eq!(el.style_id.as_deref(), Some("Strong"));
        assert!(el.flag("isBold"));
        assert!(!el.flag("isItalic"));
        assert_eq!(el.children[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_walk_preorder() {
        let tree = Element::paragraph()
            .with_child(Element::run().with_child(Element::text_node("a")))
            .with_child(Element::run().with_child(Element::text_node("b")));

        let types: Vec<_> = tree.walk().map(|e| e.element_type.as_str()).collect();
        assert_eq!(types, vec!["paragraph", "run", "text", "run", "text"]);
        assert_eq!(tree.text_content(), "ab");
    }
}
