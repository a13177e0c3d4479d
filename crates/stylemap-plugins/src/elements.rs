//! Element-family matchers
//!
//! Form fields, equations, media, generic containers and the fully
//! generic `element-template` type (see [`crate::template`]).

use std::sync::Arc;

use serde_json::{json, Value};
use stylemap_ast::{Options, OptionsExt};
use stylemap_core::matcher::matcher_fn;
use stylemap_core::plugin::{Plugin, PluginInfo};
use stylemap_core::{BoxedMatcher, MatcherRegistry, PluginError, RegisterOptions, RegistryError};

use crate::script::ScriptEngine;
use crate::template::ElementTemplate;
use crate::with_defaults;

/// Namespace of this plugin's types
pub const NAMESPACE: &str = "elements";

/// Element tags treated as media
pub const MEDIA_TYPES: [&str; 3] = ["image", "video", "audio"];

/// Element tags treated as containers by default
pub const CONTAINER_TYPES: [&str; 4] = ["structuredDocumentTag", "textBox", "frame", "group"];

fn form_field(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let field_type = options.str_opt("fieldType").map(str::to_string);
    let name = options.str_opt("name").map(str::to_string);
    Ok(matcher_fn("form-field", move |el| {
        el.is("formField")
            && field_type
                .as_deref()
                .map_or(true, |t| el.field_str("fieldType") == Some(t))
            && name.as_deref().map_or(true, |n| el.field_str("name") == Some(n))
    }))
}

fn equation(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let display = options.bool_opt("display");
    Ok(matcher_fn("equation", move |el| {
        (el.is("equation") || el.is("math"))
            && display.map_or(true, |d| el.flag("display") == d)
    }))
}

fn image(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let settings = with_defaults(json!({"requireAltText": false}), options);
    let require_alt = settings.bool_opt("requireAltText").unwrap_or(false);
    let content_type = settings.str_opt("contentType").map(str::to_string);
    Ok(matcher_fn("image", move |el| {
        el.is("image")
            && (!require_alt || el.field_str("altText").is_some_and(|alt| !alt.is_empty()))
            && content_type
                .as_deref()
                .map_or(true, |prefix| el.field_str("contentType").is_some_and(|ct| ct.starts_with(prefix)))
    }))
}

fn media(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let kinds: Vec<String> = match options.str_list_opt("mediaTypes") {
        Some(kinds) => kinds.into_iter().map(str::to_string).collect(),
        None => MEDIA_TYPES.iter().map(|s| s.to_string()).collect(),
    };
    if kinds.is_empty() {
        return Err(RegistryError::InvalidOptions("'mediaTypes' must not be empty".to_string()));
    }
    Ok(matcher_fn("media", move |el| kinds.iter().any(|k| el.is(k))))
}

fn container(options: &Options) -> Result<BoxedMatcher, RegistryError> {
    let kinds: Vec<String> = match options.str_opt("containerType") {
        Some(kind) => vec![kind.to_string()],
        None => CONTAINER_TYPES.iter().map(|s| s.to_string()).collect(),
    };
    let non_empty = options.bool_opt("nonEmpty").unwrap_or(false);
    Ok(matcher_fn("container", move |el| {
        kinds.iter().any(|k| el.is(k)) && (!non_empty || !el.children.is_empty())
    }))
}

fn element_template(options: &Options, engine: &Arc<ScriptEngine>) -> Result<BoxedMatcher, RegistryError> {
    let template_value = options
        .get("template")
        .cloned()
        .ok_or_else(|| RegistryError::InvalidOptions("'template' is required".to_string()))?;
    let mut template: ElementTemplate = serde_json::from_value(template_value)
        .map_err(|e| RegistryError::InvalidOptions(format!("invalid template: {}", e)))?;

    // Top-level override of the template's own flag
    if let Some(strict) = options.bool_opt("strict") {
        template.strict = strict;
    }
    Ok(Box::new(template.compile(engine)?))
}

/// Plugin registering element-family matchers
pub struct ElementTypesPlugin {
    info: PluginInfo,
    engine: Arc<ScriptEngine>,
}

impl Default for ElementTypesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTypesPlugin {
    /// Catalog name
    pub const NAME: &'static str = "element-types";

    pub fn new() -> Self {
        Self::with_engine(Arc::new(ScriptEngine::new()))
    }

    /// Share a script engine for template scripts
    pub fn with_engine(engine: Arc<ScriptEngine>) -> Self {
        Self {
            info: PluginInfo::new(Self::NAME, env!("CARGO_PKG_VERSION")),
            engine,
        }
    }

    /// Constructor for a [`stylemap_core::PluginCatalog`]
    pub fn boxed() -> Box<dyn Plugin> {
        Box::new(Self::new())
    }

    /// Type names this plugin registers
    pub fn types() -> [&'static str; 6] {
        ["form-field", "equation", "image", "media", "container", "element-template"]
    }
}

fn meta(description: &str) -> RegisterOptions {
    RegisterOptions::default()
        .with_namespace(NAMESPACE)
        .with_priority(5)
        .with_description(description)
}

impl Plugin for ElementTypesPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut PluginInfo {
        &mut self.info
    }

    fn register(&self, registry: &mut MatcherRegistry) -> Result<(), PluginError> {
        let engine = Arc::clone(&self.engine);
        registry
            .register_with("form-field", form_field, meta("Form field, optionally by fieldType or name"))
            .register_with("equation", equation, meta("Equation, optionally display-only"))
            .register_with("image", image, meta("Image, optionally requiring alt text"))
            .register_with("media", media, meta("Image, video or audio element"))
            .register_with("container", container, meta("Generic container element"))
            .register_with(
                "element-template",
                move |options: &Options| element_template(options, &engine),
                meta("Generic structural template with constraints").with_validation(|_, options| {
                    options.get("template").is_some_and(Value::is_object)
                }),
            );
        Ok(())
    }

    fn description(&self) -> String {
        "Form field, equation, media, container and generic template matchers".to_string()
    }
}
