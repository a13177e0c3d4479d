//! Generic element templates
//!
//! A richer relative of the core's declarative templates: every property
//! may carry a constraint (exact value, regex, one-of list or script),
//! child templates nest, and a strict flag controls how children line up.
//!
//! ```json
//! {
//!   "type": "paragraph",
//!   "properties": { "styleName": { "regex": "^Heading [1-3]$" } },
//!   "attributes": { "align": { "oneOf": ["left", "center"] } },
//!   "children": [ { "type": "run", "properties": { "isBold": true } } ],
//!   "strict": false
//! }
//! ```
//!
//! In lenient mode child templates must match an ordered subsequence of
//! the element's children. In strict mode the element must have exactly
//! as many children as templates and they must match pairwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use rhai::AST;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stylemap_ast::{Element, Options};
use stylemap_core::{Matcher, RegistryError};

use crate::script::ScriptEngine;

/// Constraint on a single value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    /// Value (as text) matches a regular expression
    Regex {
        regex: String,
    },
    /// Value equals one of the listed values
    OneOf {
        #[serde(rename = "oneOf")]
        one_of: Vec<Value>,
    },
    /// Rhai script returning a boolean; sees `value`, `element`, `options`
    Script {
        script: String,
    },
    /// Exact value
    Exact(Value),
}

/// Structural element template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementTemplate {
    /// Required element tag
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    /// Property constraints (`styleName`, `text`, domain fields)
    pub properties: BTreeMap<String, Constraint>,
    /// Attribute map constraints
    pub attributes: BTreeMap<String, Constraint>,
    /// Child templates
    pub children: Vec<ElementTemplate>,
    /// Children must line up one-to-one
    pub strict: bool,
    /// Whole-element script predicate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl ElementTemplate {
    /// Template for an element tag
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type.into()),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, constraint: Constraint) -> Self {
        self.properties.insert(name.into(), constraint);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, constraint: Constraint) -> Self {
        self.attributes.insert(name.into(), constraint);
        self
    }

    pub fn with_child(mut self, child: ElementTemplate) -> Self {
        self.children.push(child);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Compile regexes and scripts
    pub fn compile(&self, engine: &Arc<ScriptEngine>) -> Result<CompiledTemplate, RegistryError> {
        let compile_map = |map: &BTreeMap<String, Constraint>| {
            map.iter()
                .map(|(name, c)| Ok((name.clone(), CompiledConstraint::compile(c, engine)?)))
                .collect::<Result<Vec<_>, RegistryError>>()
        };

        Ok(CompiledTemplate {
            element_type: self.element_type.clone(),
            properties: compile_map(&self.properties)?,
            attributes: compile_map(&self.attributes)?,
            children: self
                .children
                .iter()
                .map(|child| child.compile(engine))
                .collect::<Result<_, _>>()?,
            strict: self.strict,
            script: self
                .script
                .as_deref()
                .map(|s| compile_script(s, engine))
                .transpose()?,
            engine: Arc::clone(engine),
        })
    }
}

fn compile_script(script: &str, engine: &ScriptEngine) -> Result<AST, RegistryError> {
    engine
        .compile(script)
        .map_err(|e| RegistryError::InvalidOptions(e.to_string()))
}

enum CompiledConstraint {
    Regex(Regex),
    OneOf(Vec<Value>),
    Script(AST),
    Exact(Value),
}

impl CompiledConstraint {
    fn compile(constraint: &Constraint, engine: &ScriptEngine) -> Result<Self, RegistryError> {
        Ok(match constraint {
            Constraint::Regex { regex } => Self::Regex(
                Regex::new(regex)
                    .map_err(|e| RegistryError::InvalidOptions(format!("invalid regex '{}': {}", regex, e)))?,
            ),
            Constraint::OneOf { one_of } => Self::OneOf(one_of.clone()),
            Constraint::Script { script } => Self::Script(compile_script(script, engine)?),
            Constraint::Exact(value) => Self::Exact(value.clone()),
        })
    }

    fn check(&self, value: Option<&Value>, element: &Element, engine: &ScriptEngine) -> bool {
        match self {
            Self::Regex(re) => match value {
                Some(Value::String(s)) => re.is_match(s),
                Some(Value::Number(n)) => re.is_match(&n.to_string()),
                Some(Value::Bool(b)) => re.is_match(&b.to_string()),
                _ => false,
            },
            Self::OneOf(options) => value.is_some_and(|v| options.contains(v)),
            Self::Exact(expected) => value == Some(expected),
            Self::Script(ast) => engine
                .eval_predicate(ast, element, value, &Options::new())
                .unwrap_or_else(|e| {
                    tracing::debug!("Constraint script failed: {}", e);
                    false
                }),
        }
    }
}

/// A template ready for matching
pub struct CompiledTemplate {
    element_type: Option<String>,
    properties: Vec<(String, CompiledConstraint)>,
    attributes: Vec<(String, CompiledConstraint)>,
    children: Vec<CompiledTemplate>,
    strict: bool,
    script: Option<AST>,
    engine: Arc<ScriptEngine>,
}

impl CompiledTemplate {
    fn matches_children(&self, element: &Element) -> bool {
        if self.strict {
            return element.children.len() == self.children.len()
                && self
                    .children
                    .iter()
                    .zip(&element.children)
                    .all(|(template, child)| template.matches(child));
        }

        // Ordered subsequence: greedily consume children
        let mut remaining = element.children.iter();
        self.children
            .iter()
            .all(|template| remaining.any(|child| template.matches(child)))
    }
}

impl Matcher for CompiledTemplate {
    fn matches(&self, element: &Element) -> bool {
        if let Some(ref element_type) = self.element_type {
            if !element.is(element_type) {
                return false;
            }
        }

        let properties_hold = self.properties.iter().all(|(name, constraint)| {
            let value = element.property(name);
            constraint.check(value.as_deref(), element, &self.engine)
        });
        if !properties_hold {
            return false;
        }

        let attributes_hold = self
            .attributes
            .iter()
            .all(|(name, constraint)| constraint.check(element.attribute(name), element, &self.engine));
        if !attributes_hold || !self.matches_children(element) {
            return false;
        }

        match self.script {
            Some(ref ast) => self
                .engine
                .eval_predicate(ast, element, None, &Options::new())
                .unwrap_or(false),
            None => true,
        }
    }

    fn describe(&self) -> String {
        format!(
            "element-template({})",
            self.element_type.as_deref().unwrap_or("*")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Arc<ScriptEngine> {
        Arc::new(ScriptEngine::new())
    }

    fn compile(value: Value) -> CompiledTemplate {
        let template: ElementTemplate = serde_json::from_value(value).unwrap();
        template.compile(&engine()).unwrap()
    }

    #[test]
    fn test_constraint_deserialization() {
        let template: ElementTemplate = serde_json::from_value(json!({
            "type": "paragraph",
            "properties": {
                "styleName": {"regex": "^Heading"},
                "level": {"oneOf": [1, 2]},
                "text": {"script": "value != ()"},
                "isBold": true
            }
        }))
        .unwrap();

        assert!(matches!(template.properties["styleName"], Constraint::Regex { .. }));
        assert!(matches!(template.properties["level"], Constraint::OneOf { .. }));
        assert!(matches!(template.properties["text"], Constraint::Script { .. }));
        assert_eq!(template.properties["isBold"], Constraint::Exact(json!(true)));
    }

    #[test]
    fn test_property_constraints() {
        let matcher = compile(json!({
            "type": "paragraph",
            "properties": {
                "styleName": {"regex": "^Heading [1-3]$"},
                "level": {"oneOf": [1, 2, 3]}
            }
        }));

        let h2 = Element::paragraph().with_style_name("Heading 2").with_field("level", 2);
        assert!(matcher.matches(&h2));
        assert!(!matcher.matches(&Element::paragraph().with_style_name("Heading 4").with_field("level", 4)));
        assert!(!matcher.matches(&Element::paragraph().with_style_name("Heading 2")));
        assert!(!matcher.matches(&Element::run().with_style_name("Heading 2").with_field("level", 2)));
    }

    #[test]
    fn test_attribute_and_script_constraints() {
        let matcher = compile(json!({
            "attributes": {"align": {"oneOf": ["left", "center"]}},
            "script": "element.children.len() > 0"
        }));

        let centered = Element::table()
            .with_attribute("align", "center")
            .with_child(Element::new("row"));
        assert!(matcher.matches(&centered));
        assert!(!matcher.matches(&Element::table().with_attribute("align", "center")));
        assert!(!matcher.matches(&Element::table().with_attribute("align", "right").with_child(Element::new("row"))));
    }

    #[test]
    fn test_lenient_children_are_ordered_subsequence() {
        let matcher = compile(json!({
            "type": "paragraph",
            "children": [
                {"type": "run", "properties": {"isBold": true}},
                {"type": "break"}
            ]
        }));

        let para = Element::paragraph()
            .with_child(Element::run())
            .with_child(Element::run().with_field("isBold", true))
            .with_child(Element::text_node("x"))
            .with_child(Element::break_of("line"));
        assert!(matcher.matches(&para));

        let reversed = Element::paragraph()
            .with_child(Element::break_of("line"))
            .with_child(Element::run().with_field("isBold", true));
        assert!(!matcher.matches(&reversed));
    }

    #[test]
    fn test_strict_children() {
        let matcher = compile(json!({
            "type": "paragraph",
            "strict": true,
            "children": [{"type": "run"}]
        }));

        assert!(matcher.matches(&Element::paragraph().with_child(Element::run())));
        assert!(!matcher.matches(
            &Element::paragraph()
                .with_child(Element::run())
                .with_child(Element::run())
        ));
    }

    #[test]
    fn test_invalid_regex_fails_compilation() {
        let template = ElementTemplate::new("paragraph")
            .with_property("styleName", Constraint::Regex { regex: "(".into() });
        assert!(matches!(
            template.compile(&engine()),
            Err(RegistryError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_failing_script_is_non_match() {
        let template = ElementTemplate::new("run").with_script("undefined_fn()");
        let matcher = template.compile(&engine()).unwrap();
        assert!(!matcher.matches(&Element::run()));
    }
}
