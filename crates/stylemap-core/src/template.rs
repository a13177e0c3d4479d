//! Declarative template matching
//!
//! A [`MatchTemplate`] describes an element structurally: its tag, an
//! optional style, and a list of conditions that must all hold. Templates
//! can be written in configuration files, so custom conditions refer to
//! evaluators by name; the registry resolves those names when the matcher
//! is created.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stylemap_ast::{Element, Options};

use crate::error::PredicateError;
use crate::matcher::{guarded, Matcher};

/// Named evaluator for `custom` conditions
pub type Evaluator =
    Arc<dyn Fn(&Element, &Options) -> Result<bool, PredicateError> + Send + Sync>;

/// Evaluators by name
pub type EvaluatorTable = HashMap<String, Evaluator>;

/// Structural description of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTemplate {
    /// Required element tag
    pub element_type: String,

    /// Required style ID, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,

    /// Required style name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,

    /// Conditions that must all hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A single template condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// Direct field equality (`type`, `styleName`, `breakType`, ...)
    Property { property: String, value: Value },

    /// Attribute map equality
    Attribute { attribute: String, value: Value },

    /// Named evaluator invoked with the element and condition options
    Custom {
        evaluator: String,
        #[serde(default)]
        options: Options,
    },
}

impl MatchTemplate {
    /// Template matching any element with the given tag
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            style_id: None,
            style_name: None,
            conditions: Vec::new(),
        }
    }

    /// Require a style ID
    pub fn with_style_id(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    /// Require a style name
    pub fn with_style_name(mut self, style_name: impl Into<String>) -> Self {
        self.style_name = Some(style_name.into());
        self
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Names of the custom evaluators this template refers to
    pub fn evaluator_names(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter_map(|c| match c {
                Condition::Custom { evaluator, .. } => Some(evaluator.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Condition {
    /// Property equality condition
    pub fn property(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Property {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Attribute equality condition
    pub fn attribute(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Attribute {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Custom evaluator condition
    pub fn custom(evaluator: impl Into<String>, options: Options) -> Self {
        Condition::Custom {
            evaluator: evaluator.into(),
            options,
        }
    }
}

/// Matcher compiled from a [`MatchTemplate`]
pub struct TemplateMatcher {
    template: MatchTemplate,
    evaluators: EvaluatorTable,
}

impl TemplateMatcher {
    /// Compile a template, resolving its custom evaluators.
    ///
    /// A custom condition whose evaluator is not in `available` never holds.
    pub fn new(template: MatchTemplate, available: &EvaluatorTable) -> Self {
        let evaluators = template
            .evaluator_names()
            .into_iter()
            .filter_map(|name| {
                let evaluator = available.get(name);
                if evaluator.is_none() {
                    tracing::warn!("Template evaluator '{}' is not registered", name);
                }
                evaluator.map(|e| (name.to_string(), e.clone()))
            })
            .collect();

        Self {
            template,
            evaluators,
        }
    }

    /// The compiled template
    pub fn template(&self) -> &MatchTemplate {
        &self.template
    }

    fn check(&self, condition: &Condition, element: &Element) -> bool {
        match condition {
            Condition::Property { property, value } => element
                .property(property)
                .is_some_and(|actual| &*actual == value),
            Condition::Attribute { attribute, value } => element.attribute(attribute) == Some(value),
            Condition::Custom { evaluator, options } => match self.evaluators.get(evaluator) {
                Some(evaluate) => guarded(|el| evaluate(el, options), element).unwrap_or_else(|e| {
                    tracing::debug!("Evaluator '{}' failed: {}", evaluator, e);
                    false
                }),
                None => false,
            },
        }
    }
}

impl Matcher for TemplateMatcher {
    fn matches(&self, element: &Element) -> bool {
        let template = &self.template;

        if template.element_type != element.element_type {
            return false;
        }
        if template.style_id.is_some() && template.style_id != element.style_id {
            return false;
        }
        if template.style_name.is_some() && template.style_name != element.style_name {
            return false;
        }

        template
            .conditions
            .iter()
            .all(|condition| self.check(condition, element))
    }

    fn describe(&self) -> String {
        format!(
            "template({}, {} conditions)",
            self.template.element_type,
            self.template.conditions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn title_template() -> MatchTemplate {
        serde_json::from_value(json!({
            "elementType": "paragraph",
            "conditions": [
                {"type": "property", "property": "styleName", "value": "Title"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_property_condition() {
        let matcher = TemplateMatcher::new(title_template(), &EvaluatorTable::new());

        assert!(matcher.matches(&Element::paragraph().with_style_name("Title")));
        assert!(!matcher.matches(&Element::paragraph().with_style_name("Body")));
        assert!(!matcher.matches(&Element::run().with_style_name("Title")));
    }

    #[test]
    fn test_style_constraints() {
        let template = MatchTemplate::new("paragraph").with_style_id("Heading1");
        let matcher = TemplateMatcher::new(template, &EvaluatorTable::new());

        assert!(matcher.matches(&Element::paragraph().with_style_id("Heading1")));
        assert!(!matcher.matches(&Element::paragraph().with_style_id("Heading2")));
        assert!(!matcher.matches(&Element::paragraph()));
    }

    #[test]
    fn test_attribute_condition() {
        let template =
            MatchTemplate::new("paragraph").with_condition(Condition::attribute("align", "center"));
        let matcher = TemplateMatcher::new(template, &EvaluatorTable::new());

        assert!(matcher.matches(&Element::paragraph().with_attribute("align", "center")));
        assert!(!matcher.matches(&Element::paragraph().with_attribute("align", "left")));
        assert!(!matcher.matches(&Element::paragraph()));
    }

    #[test]
    fn test_custom_condition() {
        let mut evaluators = EvaluatorTable::new();
        let long_text: Evaluator = Arc::new(|el: &Element, opts: &Options| {
            let min = opts.get("min").and_then(Value::as_u64).unwrap_or(0) as usize;
            Ok(el.text_content().len() >= min)
        });
        evaluators.insert("long-text".to_string(), long_text);

        let options = json!({"min": 5}).as_object().cloned().unwrap();
        let template =
            MatchTemplate::new("run").with_condition(Condition::custom("long-text", options));
        let matcher = TemplateMatcher::new(template, &evaluators);

        assert!(matcher.matches(&Element::run().with_text("Hello world")));
        assert!(!matcher.matches(&Element::run().with_text("Hi")));
    }

    #[test]
    fn test_failing_or_missing_evaluator_never_matches() {
        let mut evaluators = EvaluatorTable::new();
        let failing: Evaluator =
            Arc::new(|_: &Element, _: &Options| Err(PredicateError::Failed("nope".into())));
        evaluators.insert("failing".to_string(), failing);

        let failing_template = MatchTemplate::new("run")
            .with_condition(Condition::custom("failing", Options::new()));
        let missing_template = MatchTemplate::new("run")
            .with_condition(Condition::custom("missing", Options::new()));

        assert!(!TemplateMatcher::new(failing_template, &evaluators).matches(&Element::run()));
        assert!(!TemplateMatcher::new(missing_template, &evaluators).matches(&Element::run()));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let template = MatchTemplate::new("break")
            .with_condition(Condition::property("breakType", "section"))
            .with_condition(Condition::property("continuous", true));
        let matcher = TemplateMatcher::new(template, &EvaluatorTable::new());

        let continuous = Element::break_of("section").with_field("continuous", true);
        let next_page = Element::break_of("section").with_field("continuous", false);
        assert!(matcher.matches(&continuous));
        assert!(!matcher.matches(&next_page));
    }
}
