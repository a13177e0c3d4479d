//! Break-family matchers
//!
//! Extends the built-in line/page/column breaks with section and
//! text-wrapping breaks. Every factory starts from a defaults map and lets
//! rule options override it, so `continuous-break` with
//! `{"continuous": false}` is the same predicate as a plain section break
//! that is explicitly not continuous.
//!
//! | type                 | discriminant fields              |
//! |----------------------|----------------------------------|
//! | `section-break`      | `breakType`, `sectionType`       |
//! | `continuous-break`   | `sectionType`, `continuous`      |
//! | `odd-page-break`     | `sectionType`, `side`            |
//! | `even-page-break`    | `sectionType`, `side`            |
//! | `text-wrapping-break`| `breakType`, `wrapType`          |
//! | `clear-break`        | `clear`                          |
//! | `conditional-break`  | any field, with a fallback kind  |

use serde_json::json;
use stylemap_ast::predicates::{self, BreakKind};
use stylemap_ast::{Element, Options, OptionsExt};
use stylemap_core::matcher::matcher_fn;
use stylemap_core::plugin::{Plugin, PluginInfo};
use stylemap_core::{
    BoxedMatcher, ConditionalMatcher, Matcher, MatcherRegistry, PluginError, PredicateError,
    RegisterOptions, RegistryError,
};

use crate::with_defaults;

/// Namespace of this plugin's types
pub const NAMESPACE: &str = "breaks";

fn is_section_break(element: &Element) -> bool {
    element.is("break") && element.field_str("breakType") == Some("section")
}

fn field_matches(element: &Element, field: &str, expected: Option<&str>) -> bool {
    match expected {
        Some(expected) => element.field_str(field) == Some(expected),
        None => true,
    }
}

fn section_break(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let settings = with_defaults(json!({}), options);
    let section_type = settings.str_opt("sectionType").map(str::to_string);
    Ok(matcher_fn("section-break", move |el| {
        is_section_break(el) && field_matches(el, "sectionType", section_type.as_deref())
    }))
}

fn continuous_break(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let settings = with_defaults(json!({"continuous": true}), options);
    let continuous = settings.bool_opt("continuous").ok_or_else(|| {
        RegistryError::InvalidOptions("'continuous' must be a boolean".to_string())
    })?;
    Ok(matcher_fn("continuous-break", move |el| {
        let is_continuous = el.field_str("sectionType") == Some("continuous") || el.flag("continuous");
        is_section_break(el) && is_continuous == continuous
    }))
}

fn page_side_break(name: &'static str, default_side: &'static str) -> impl Fn(&Options) -> Result<BoxedMatcher, RegistryError> {
    move |options: &Options| {
        let settings = with_defaults(json!({"side": default_side}), options);
        let side = settings
            .str_opt("side")
            .ok_or_else(|| RegistryError::InvalidOptions("'side' must be a string".to_string()))?
            .to_string();
        let section_type = format!("{}Page", side);
        Ok(matcher_fn(name, move |el| {
            is_section_break(el)
                && (el.field_str("side") == Some(side.as_str())
                    || el.field_str("sectionType") == Some(section_type.as_str()))
        }))
    }
}

fn text_wrapping_break(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let settings = with_defaults(json!({}), options);
    let wrap_type = settings.str_opt("wrapType").map(str::to_string);
    Ok(matcher_fn("text-wrapping-break", move |el| {
        el.is("break")
            && el.field_str("breakType") == Some("textWrapping")
            && field_matches(el, "wrapType", wrap_type.as_deref())
    }))
}

fn clear_break(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let settings = with_defaults(json!({"clear": "any"}), options);
    let clear = settings.str_opt("clear").unwrap_or("any").to_string();
    Ok(matcher_fn("clear-break", move |el| {
        if !el.is("break") {
            return false;
        }
        match el.field_str("clear") {
            Some("none") | None => false,
            Some(actual) => clear == "any" || actual == clear,
        }
    }))
}

/// Built-in break kind by name (`line`, `page`, `column` or the type name)
fn break_kind(name: &str) -> Option<BreakKind> {
    BreakKind::all()
        .iter()
        .copied()
        .find(|k| k.as_str() == name || k.type_name() == name)
}

/// A break matcher guarded by a user predicate.
///
/// The predicate decides; when it returns `false` or fails, the fallback
/// matcher (if any) is asked instead. Restricting to break elements is
/// the predicate's job, see [`ConditionalBreakMatcher::breaks_only`].
pub struct ConditionalBreakMatcher {
    inner: ConditionalMatcher,
}

impl ConditionalBreakMatcher {
    /// Guard with a fallible predicate
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&Element) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            inner: ConditionalMatcher::new(condition),
        }
    }

    /// Guard with a predicate that only runs for break elements.
    ///
    /// Any other element yields `false` before the predicate is called,
    /// so the fallback still gets its say.
    pub fn breaks_only<F>(condition: F) -> Self
    where
        F: Fn(&Element) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self::new(move |el| if el.is("break") { condition(el) } else { Ok(false) })
    }

    /// Delegate to this matcher when the predicate is false or fails
    pub fn with_fallback(self, fallback: BoxedMatcher) -> Self {
        Self {
            inner: self.inner.with_fallback(fallback),
        }
    }
}

impl Matcher for ConditionalBreakMatcher {
    fn matches(&self, element: &Element) -> bool {
        self.inner.matches(element)
    }

    fn describe(&self) -> String {
        format!("break {}", self.inner.describe())
    }
}

/// `conditional-break`: `{"field": .., "equals": .., "fallback": "page"}`
fn conditional_break(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let field = options
        .str_opt("field")
        .ok_or_else(|| RegistryError::InvalidOptions("'field' is required".to_string()))?
        .to_string();
    let expected = options.get("equals").cloned();

    let mut matcher = ConditionalBreakMatcher::breaks_only(move |el| match el.property(&field) {
        Some(actual) => Ok(expected.as_ref().map_or(true, |e| &*actual == e)),
        None => Err(PredicateError::Failed(format!("field '{}' is missing", field))),
    });

    if let Some(name) = options.str_opt("fallback") {
        let kind = break_kind(name)
            .ok_or_else(|| RegistryError::InvalidOptions(format!("unknown fallback break '{}'", name)))?;
        matcher = matcher.with_fallback(matcher_fn(kind.type_name(), move |el| predicates::is_break(el, kind)));
    }

    Ok(Box::new(matcher))
}

/// Plugin registering the extended break family
pub struct BreakTypesPlugin {
    info: PluginInfo,
}

impl Default for BreakTypesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakTypesPlugin {
    /// Catalog name
    pub const NAME: &'static str = "break-types";

    pub fn new() -> Self {
        Self {
            info: PluginInfo::new(Self::NAME, env!("CARGO_PKG_VERSION")),
        }
    }

    /// Constructor for a [`stylemap_core::PluginCatalog`]
    pub fn boxed() -> Box<dyn Plugin> {
        Box::new(Self::new())
    }

    /// Type names this plugin registers
    pub fn types() -> [&'static str; 7] {
        [
            "section-break",
            "continuous-break",
            "odd-page-break",
            "even-page-break",
            "text-wrapping-break",
            "clear-break",
            "conditional-break",
        ]
    }
}

fn meta(description: &str) -> RegisterOptions {
    RegisterOptions::default()
        .with_namespace(NAMESPACE)
        .with_priority(10)
        .with_description(description)
}

impl Plugin for BreakTypesPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut PluginInfo {
        &mut self.info
    }

    fn register(&self, registry: &mut MatcherRegistry) -> Result<(), PluginError> {
        registry
            .register_with("section-break", section_break, meta("Section break, optionally of a sectionType"))
            .register_with("continuous-break", continuous_break, meta("Continuous section break"))
            .register_with(
                "odd-page-break",
                page_side_break("odd-page-break", "odd"),
                meta("Section break starting on an odd page"),
            )
            .register_with(
                "even-page-break",
                page_side_break("even-page-break", "even"),
                meta("Section break starting on an even page"),
            )
            .register_with(
                "text-wrapping-break",
                text_wrapping_break,
                meta("Text-wrapping break, optionally of a wrapType"),
            )
            .register_with("clear-break", clear_break, meta("Break clearing floating content"))
            .register_with(
                "conditional-break",
                conditional_break,
                meta("Break matching a field test, with a fallback break kind"),
            );
        Ok(())
    }

    fn description(&self) -> String {
        "Section, text-wrapping and conditional break matchers".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn registry() -> MatcherRegistry {
        let mut registry = MatcherRegistry::new();
        registry.register_plugin(&BreakTypesPlugin::new()).unwrap();
        registry
    }

    fn opts(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    fn section(section_type: &str) -> Element {
        Element::break_of("section").with_field("sectionType", section_type)
    }

    fn create(registry: &MatcherRegistry, type_name: &str, options: Value) -> BoxedMatcher {
        registry
            .create_matcher(type_name, &opts(options))
            .value
            .unwrap_or_else(|| panic!("{} not created", type_name))
    }

    #[test]
    fn test_all_types_registered() {
        let registry = registry();
        for type_name in BreakTypesPlugin::types() {
            assert!(registry.has_type(type_name));
            assert_eq!(registry.matcher_info(type_name).unwrap().namespace, NAMESPACE);
        }
        assert_eq!(registry.plugin_names(), vec!["break-types"]);
    }

    #[test]
    fn test_section_break() {
        let registry = registry();
        let any = create(&registry, "section-break", json!({}));
        assert!(any.matches(&section("nextPage")));
        assert!(!any.matches(&Element::break_of("page")));

        let next_page = create(&registry, "section-break", json!({"sectionType": "nextPage"}));
        assert!(next_page.matches(&section("nextPage")));
        assert!(!next_page.matches(&section("continuous")));
    }

    #[test]
    fn test_continuous_default_and_override() {
        let registry = registry();
        let continuous = create(&registry, "continuous-break", json!({}));
        assert!(continuous.matches(&section("continuous")));
        assert!(continuous.matches(&Element::break_of("section").with_field("continuous", true)));
        assert!(!continuous.matches(&section("nextPage")));

        let not_continuous = create(&registry, "continuous-break", json!({"continuous": false}));
        assert!(not_continuous.matches(&section("nextPage")));
        assert!(!not_continuous.matches(&section("continuous")));

        let invalid = registry.create_matcher("continuous-break", &opts(json!({"continuous": "yes"})));
        assert!(invalid.has_errors());
    }

    #[test]
    fn test_page_side_breaks() {
        let registry = registry();
        let odd = create(&registry, "odd-page-break", json!({}));
        assert!(odd.matches(&section("oddPage")));
        assert!(odd.matches(&section("nextPage").with_field("side", "odd")));
        assert!(!odd.matches(&section("evenPage")));

        let overridden = create(&registry, "odd-page-break", json!({"side": "even"}));
        assert!(overridden.matches(&section("evenPage")));
    }

    #[test]
    fn test_wrapping_and_clear() {
        let registry = registry();
        let wrap = Element::break_of("textWrapping").with_field("wrapType", "tight");
        assert!(create(&registry, "text-wrapping-break", json!({})).matches(&wrap));
        assert!(!create(&registry, "text-wrapping-break", json!({"wrapType": "square"})).matches(&wrap));

        let clear_all = Element::break_of("textWrapping").with_field("clear", "all");
        assert!(create(&registry, "clear-break", json!({})).matches(&clear_all));
        assert!(create(&registry, "clear-break", json!({"clear": "all"})).matches(&clear_all));
        assert!(!create(&registry, "clear-break", json!({"clear": "left"})).matches(&clear_all));
        assert!(!create(&registry, "clear-break", json!({}))
            .matches(&Element::break_of("line").with_field("clear", "none")));
    }

    #[test]
    fn test_conditional_break_uses_fallback() {
        let registry = registry();
        let matcher = create(
            &registry,
            "conditional-break",
            json!({"field": "sectionType", "equals": "continuous", "fallback": "page"}),
        );

        assert!(matcher.matches(&section("continuous")));
        // Predicate fails (field missing), fallback decides
        assert!(matcher.matches(&Element::break_of("page")));
        assert!(!matcher.matches(&Element::break_of("line")));
        // Non-break elements fall through to the break-kind fallback
        assert!(!matcher.matches(&Element::paragraph().with_field("sectionType", "continuous")));

        let bad = registry.create_matcher("conditional-break", &opts(json!({"field": "x", "fallback": "nope"})));
        assert!(bad.value.is_none());
    }

    #[test]
    fn test_conditional_break_matcher_catches_panics() {
        let matcher = ConditionalBreakMatcher::new(|_| panic!("bad predicate"))
            .with_fallback(matcher_fn("always", |_| true));
        assert!(matcher.matches(&Element::break_of("column")));
        assert!(matcher.matches(&Element::run()));
    }

    #[test]
    fn test_failing_condition_defers_to_fallback_for_any_element() {
        let matcher = ConditionalBreakMatcher::new(|_| Err(PredicateError::Failed("no data".into())))
            .with_fallback(matcher_fn("always", |_| true));
        assert!(matcher.matches(&Element::run()));
        assert!(matcher.matches(&Element::paragraph()));

        let without_fallback = ConditionalBreakMatcher::new(|_| Err(PredicateError::Failed("no data".into())));
        assert!(!without_fallback.matches(&Element::run()));
    }

    #[test]
    fn test_breaks_only_skips_condition_for_other_elements() {
        let matcher = ConditionalBreakMatcher::breaks_only(|_| panic!("condition ran"))
            .with_fallback(matcher_fn("always", |_| true));
        assert!(matcher.matches(&Element::paragraph()));

        let strict = ConditionalBreakMatcher::breaks_only(|_| Ok(true));
        assert!(strict.matches(&Element::break_of("line")));
        assert!(!strict.matches(&Element::run()));
    }

    #[test]
    fn test_register_twice_is_safe() {
        let mut registry = registry();
        registry.register_plugin(&BreakTypesPlugin::new()).unwrap();
        assert_eq!(registry.plugin_names(), vec!["break-types"]);
        assert!(registry.create_matcher("section-break", &Options::new()).is_success());
    }
}
