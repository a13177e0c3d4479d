//! End-to-end properties of the matcher engine
//!
//! These tests drive the public API only: registry setup, matcher
//! creation, diagnostics and the transform extension.

use std::sync::Arc;

use serde_json::json;
use stylemap_ast::{Element, Options};
use stylemap_core::builtins::builtin_types;
use stylemap_core::diagnostics::ReportContext;
use stylemap_core::fallback::FallbackContext;
use stylemap_core::matcher::matcher_fn;
use stylemap_core::suggest::{levenshtein, similarity};
use stylemap_core::transform::{Params, TransformOptions};
use stylemap_core::{
    BoxedMatcher, Condition, ConditionalMatcher, Diagnostics, ErrorCode, FallbackStrategy, MatchError,
    MatchTemplate, Matcher, MatcherConfig, MatcherRegistry, Outcome, Plugin, PluginCatalog, PluginError,
    PluginInfo, PredicateError, RegisterOptions, TransformEngine, TransformError, TransformOutput,
    TransformProcessor, TransformRegistration, TransformTemplate,
};
use tempfile::TempDir;

fn opts(value: serde_json::Value) -> Options {
    value.as_object().cloned().unwrap_or_default()
}

fn elements(value: serde_json::Value) -> Vec<Element> {
    serde_json::from_value(value).unwrap()
}

#[test]
fn every_builtin_creates_successfully() {
    let registry = MatcherRegistry::new();
    for type_name in builtin_types() {
        let outcome = registry.create_matcher(type_name, &Options::new());
        assert!(outcome.value.is_some(), "{} failed: {:?}", type_name, outcome.messages);
        assert!(outcome.messages.is_empty());
    }
}

#[test]
fn builtins_match_deserialized_elements() {
    let registry = MatcherRegistry::new();
    let tree = elements(json!([
        {"type": "paragraph", "styleName": "Heading 1", "children": [
            {"type": "run", "isBold": true, "children": [{"type": "text", "text": "Intro"}]},
            {"type": "break", "breakType": "line"}
        ]},
        {"type": "break", "breakType": "page"},
        {"type": "table", "styleId": "Grid"}
    ]));

    let count = |type_name: &str, options: Options| {
        let matcher = registry.create_matcher(type_name, &options).value.unwrap();
        tree.iter()
            .flat_map(|e| e.walk())
            .filter(|e| matcher.matches(e))
            .count()
    };

    assert_eq!(count("page-break", Options::new()), 1);
    assert_eq!(count("line-break", Options::new()), 1);
    assert_eq!(count("bold", Options::new()), 1);
    assert_eq!(count("paragraph", opts(json!({"styleName": "heading 1"}))), 1);
    assert_eq!(count("table", opts(json!({"styleId": "Other"}))), 0);
}

#[test]
fn unknown_type_is_a_no_op_matcher() {
    let registry = MatcherRegistry::new();
    let outcome = registry.create_matcher("nonexistent-xyz", &Options::new());

    let matcher = outcome.value.as_ref().expect("ignore-unknown resolves");
    for element in [Element::paragraph(), Element::run(), Element::break_of("page")] {
        assert!(!matcher.matches(&element));
    }
    assert!(!outcome.has_errors());
}

#[test]
fn re_registration_replaces_behavior() {
    let mut registry = MatcherRegistry::new();
    registry.register("bold", |_| Ok(matcher_fn("first", |_| true)));
    registry.register_with(
        "bold",
        |_| Ok(matcher_fn("second", |el| el.is("strong"))),
        RegisterOptions::default().with_namespace("override"),
    );

    let matcher = registry.create_matcher("bold", &Options::new()).value.unwrap();
    assert!(matcher.matches(&Element::new("strong")));
    assert!(!matcher.matches(&Element::run().with_field("isBold", true)));
    assert_eq!(registry.matcher_info("bold").unwrap().namespace, "override");
}

#[test]
fn available_types_sorted_unique_superset() {
    let mut registry = MatcherRegistry::new();
    registry.register("zeta", |_| Ok(matcher_fn("zeta", |_| false)));
    registry
        .register_transform("zeta", TransformRegistration::template("zeta"))
        .unwrap();

    let types = registry.available_types();
    assert!(types.windows(2).all(|w| w[0] < w[1]));
    for builtin in builtin_types() {
        assert!(types.iter().any(|t| t == builtin));
    }
}

#[test]
fn template_matcher_property_condition() {
    let mut registry = MatcherRegistry::new();
    registry.register_template(
        "title",
        MatchTemplate::new("paragraph").with_condition(Condition::property("styleName", "Title")),
        RegisterOptions::default(),
    );
    let matcher = registry.create_matcher("title", &Options::new()).value.unwrap();

    let cases = elements(json!([
        {"type": "paragraph", "styleName": "Title"},
        {"type": "paragraph", "styleName": "Body"},
        {"type": "run", "styleName": "Title"}
    ]));
    let results: Vec<bool> = cases.iter().map(|e| matcher.matches(e)).collect();
    assert_eq!(results, vec![true, false, false]);
}

#[test]
fn template_from_json_with_attribute_and_custom() {
    let template: MatchTemplate = serde_json::from_value(json!({
        "elementType": "paragraph",
        "conditions": [
            {"type": "attribute", "attribute": "align", "value": "center"},
            {"type": "custom", "evaluator": "min-length", "options": {"min": 3}}
        ]
    }))
    .unwrap();

    let mut registry = MatcherRegistry::new();
    registry.register_evaluator("min-length", |el, options| {
        let min = options
            .get("min")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| PredicateError::Failed("min is required".into()))?;
        Ok(el.text_content().chars().count() as u64 >= min)
    });
    registry.register_template("centered", template, RegisterOptions::default());

    let matcher = registry.create_matcher("centered", &Options::new()).value.unwrap();
    let centered = Element::paragraph()
        .with_attribute("align", "center")
        .with_child(Element::text_node("Hello"));
    assert!(matcher.matches(&centered));
    assert!(!matcher.matches(&centered.clone().with_attribute("align", "left")));
    assert!(!matcher.matches(
        &Element::paragraph()
            .with_attribute("align", "center")
            .with_child(Element::text_node("Hi"))
    ));
}

#[test]
fn levenshtein_reference_values() {
    assert_eq!(levenshtein("kitten", "sitting"), 3);
    assert!((similarity("kitten", "sitting") - 0.571).abs() < 0.001);
}

#[test]
fn fuzzy_suggestions_find_prefix() {
    let registry = MatcherRegistry::new();
    let suggestions = registry
        .diagnostics()
        .suggestions("paragrap", &registry.available_types());
    assert!(suggestions.iter().any(|s| s == "paragraph"));
}

#[test]
fn conditional_matcher_falls_back_on_failure() {
    let failing = ConditionalMatcher::new(|_| Err(PredicateError::Failed("boom".into())))
        .with_fallback(matcher_fn("yes", |_| true));
    assert!(failing.matches(&Element::break_of("page")));

    let panicking = ConditionalMatcher::new(|_| panic!("condition exploded"))
        .with_fallback(matcher_fn("yes", |_| true));
    assert!(panicking.matches(&Element::break_of("page")));

    let no_fallback = ConditionalMatcher::new(|_| panic!("condition exploded"));
    assert!(!no_fallback.matches(&Element::break_of("page")));
}

#[test]
fn transform_backed_type_without_processor_is_false() {
    let mut registry = MatcherRegistry::new();
    registry
        .register_transform("fancy", TransformRegistration::template("fancy"))
        .unwrap();

    let matcher = registry.create_matcher("fancy", &Options::new()).value.unwrap();
    assert!(!matcher.matches(&Element::paragraph().with_style_name("Title")));

    // Bound engine with a template but no processor: still false
    let mut engine = TransformEngine::new();
    engine.register_template(TransformTemplate::new("fancy", "whatever"));
    registry.bind_transform_engine(engine);
    let matcher = registry.create_matcher("fancy", &Options::new()).value.unwrap();
    assert!(!matcher.matches(&Element::paragraph().with_style_name("Title")));
}

/// Matches when the serialized element carries a given style name
struct StyleProcessor;

impl TransformProcessor for StyleProcessor {
    fn name(&self) -> &str {
        "style"
    }

    fn supports(&self) -> Vec<String> {
        vec!["1.0".to_string(), "2.0".to_string()]
    }

    fn transform(
        &self,
        xml: &str,
        _template: &TransformTemplate,
        params: &Params,
    ) -> Result<TransformOutput, TransformError> {
        let style = params
            .get("style")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let needle = format!("styleName=\"{}\"", style);
        Ok(TransformOutput::Bool(xml.contains(&needle)))
    }
}

#[test]
fn transform_backed_type_with_processor() {
    let mut engine = TransformEngine::new();
    engine.register_processor(Arc::new(StyleProcessor));
    engine.register_template(
        TransformTemplate::new("styled", "style check")
            .with_version("2.0")
            .with_parameter("style", "Quote"),
    );

    let mut registry = MatcherRegistry::new();
    registry.bind_transform_engine(engine);
    registry
        .register_transform("quote", TransformRegistration::template("styled"))
        .unwrap();
    registry
        .register_transform(
            "note",
            TransformRegistration::template("styled").with_options(opts(json!({"style": "Note"}))),
        )
        .unwrap();

    let quote = registry.create_matcher("quote", &Options::new()).value.unwrap();
    assert!(quote.matches(&Element::paragraph().with_style_name("Quote")));
    assert!(!quote.matches(&Element::paragraph().with_style_name("Note")));

    let note = registry.create_matcher("note", &Options::new()).value.unwrap();
    assert!(note.matches(&Element::paragraph().with_style_name("Note")));

    // Call-site options override registration options
    let custom = registry
        .create_matcher("note", &opts(json!({"style": "Aside"})))
        .value
        .unwrap();
    assert!(custom.matches(&Element::paragraph().with_style_name("Aside")));

    let engine = registry.transform_engine().unwrap();
    let direct = engine.transform(
        "<p styleName=\"Quote\"/>",
        "styled",
        &Params::new(),
        &TransformOptions::default(),
    );
    assert_eq!(direct.value, Some(TransformOutput::Bool(true)));
}

#[test]
fn error_report_summarizes_batch() {
    let diagnostics = Diagnostics::new();
    let available = vec!["paragraph".to_string(), "page-break".to_string()];
    let errors = vec![
        diagnostics.unknown_type_error("paragrap", &available),
        MatchError::new(ErrorCode::PluginError, "register failed").with_subject("tables"),
        diagnostics.dependency_error("tables", &["breaks".to_string()]),
    ];

    let mut context = ReportContext::new();
    context.insert("document".to_string(), json!("report.docx"));
    let report = diagnostics.create_error_report(&errors, context);

    assert_eq!(report.summary.total_errors, 1);
    assert_eq!(report.summary.total_warnings, 2);
    assert_eq!(report.summary.critical_errors, 0);
    assert!(report.has_errors());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["totalWarnings"], 2);
    assert_eq!(json["context"]["document"], "report.docx");
    assert!(report.to_string().contains("paragraph"));
}

#[test]
fn configuration_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "matchers": {
                "caption": {
                    "template": {"elementType": "paragraph", "styleName": "Caption"},
                    "options": {"priority": 3, "description": "Figure captions"}
                }
            },
            "plugins": ["not-linked"]
        }))
        .unwrap(),
    )
    .unwrap();

    let config = MatcherConfig::from_path(&path).unwrap();
    let mut registry = MatcherRegistry::new();
    let outcome = registry.load_configuration(&config, &PluginCatalog::new());

    let report = outcome.value.clone().unwrap();
    assert_eq!(report.matchers, vec!["caption"]);
    assert_eq!(report.skipped, vec!["plugin:not-linked"]);
    assert!(outcome.has_errors());

    let caption = registry.create_matcher("caption", &Options::new()).value.unwrap();
    assert!(caption.matches(&Element::paragraph().with_style_name("Caption")));
    assert_eq!(registry.types_by_priority()[0].type_name, "caption");
}

#[test]
fn failing_condition_with_true_fallback_matches_every_element() {
    let matcher = ConditionalMatcher::new(|_| Err(PredicateError::Failed("no data".into())))
        .with_fallback(matcher_fn("always", |_| true));
    for element in [Element::run(), Element::paragraph(), Element::break_of("line")] {
        assert!(matcher.matches(&element));
    }
}

struct PanickingProcessor;

impl TransformProcessor for PanickingProcessor {
    fn name(&self) -> &str {
        "panicking"
    }

    fn supports(&self) -> Vec<String> {
        vec!["1.0".to_string()]
    }

    fn transform(
        &self,
        _xml: &str,
        _template: &TransformTemplate,
        _params: &Params,
    ) -> Result<TransformOutput, TransformError> {
        panic!("processor bug")
    }
}

#[test]
fn panicking_processor_is_a_non_match() {
    let mut engine = TransformEngine::new();
    engine.register_processor(Arc::new(PanickingProcessor));
    engine.register_template(TransformTemplate::new("t", "body"));

    let mut registry = MatcherRegistry::new();
    registry.bind_transform_engine(engine);
    registry
        .register_transform("risky", TransformRegistration::template("t"))
        .unwrap();

    let matcher = registry.create_matcher("risky", &Options::new()).value.unwrap();
    assert!(!matcher.matches(&Element::paragraph()));
    assert!(!matcher.matches(&Element::run()));
}

struct PanickingStrategy;

impl FallbackStrategy for PanickingStrategy {
    fn name(&self) -> &str {
        "panicking"
    }

    fn handle(&self, _matcher_type: &str, _options: &Options, _context: &FallbackContext<'_>) -> Outcome<BoxedMatcher> {
        panic!("strategy bug")
    }
}

#[test]
fn panicking_strategy_never_escapes_create_matcher() {
    let mut registry = MatcherRegistry::new();
    registry.insert_fallback_strategy(0, Box::new(PanickingStrategy));

    let outcome = registry.create_matcher("nope", &Options::new());
    assert!(!outcome.value.as_ref().unwrap().matches(&Element::paragraph()));
    assert!(outcome.has_errors());
}

struct PanickingPlugin {
    info: PluginInfo,
}

impl Plugin for PanickingPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut PluginInfo {
        &mut self.info
    }

    fn register(&self, _registry: &mut MatcherRegistry) -> Result<(), PluginError> {
        panic!("plugin bug")
    }

    fn description(&self) -> String {
        "Panics on register".to_string()
    }
}

fn panicking_plugin() -> Box<dyn Plugin> {
    Box::new(PanickingPlugin {
        info: PluginInfo::new("panicking", "0.1.0"),
    })
}

#[test]
fn panicking_plugin_is_skipped_by_configuration() {
    let config = MatcherConfig::from_toml_str("plugins = [\"panicking\"]\n").unwrap();
    let catalog = PluginCatalog::new().with("panicking", panicking_plugin);
    let mut registry = MatcherRegistry::new();

    let outcome = registry.load_configuration(&config, &catalog);
    assert_eq!(outcome.value.clone().unwrap().skipped, vec!["plugin:panicking"]);
    assert!(outcome.has_errors());
    assert!(registry.create_matcher("paragraph", &Options::new()).is_success());
}

#[test]
fn cache_size_applies_to_prebound_engine() {
    let mut registry = MatcherRegistry::new();
    registry.bind_transform_engine(TransformEngine::new());

    let config = MatcherConfig::from_toml_str("[transform]\nmax_cache_size = 7\n").unwrap();
    let outcome = registry.load_configuration(&config, &PluginCatalog::new());

    assert!(outcome.messages.is_empty());
    assert_eq!(registry.transform_engine().unwrap().cache_stats().capacity, 7);
}

#[test]
fn reregistered_template_is_not_served_stale() {
    let mut engine = TransformEngine::new();
    engine.register_processor(Arc::new(StyleProcessor));
    engine.register_template(TransformTemplate::new("styled", "v1").with_parameter("style", "Quote"));

    let mut registry = MatcherRegistry::new();
    registry.bind_transform_engine(engine);
    registry
        .register_transform("styled", TransformRegistration::template("styled"))
        .unwrap();
    let quote = Element::paragraph().with_style_name("Quote");

    let matcher = registry.create_matcher("styled", &Options::new()).value.unwrap();
    assert!(matcher.matches(&quote));
    drop(matcher);

    registry
        .transform_engine_mut()
        .unwrap()
        .register_template(TransformTemplate::new("styled", "v2").with_parameter("style", "Note"));
    let matcher = registry.create_matcher("styled", &Options::new()).value.unwrap();
    assert!(!matcher.matches(&quote));
}
