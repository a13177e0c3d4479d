//! Reference plugins for the stylemap matcher engine
//!
//! Two plugins extend a [`MatcherRegistry`] with extra matcher types:
//!
//! - [`BreakTypesPlugin`] (`break-types`): section, column-side and
//!   text-wrapping breaks plus a conditional break matcher.
//! - [`ElementTypesPlugin`] (`element-types`): form fields, equations,
//!   media, containers and the generic `element-template` type.
//!
//! The crate also provides [`ScriptProcessor`], a transform backend
//! running Rhai template bodies.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stylemap_ast::Element;
//! use stylemap_core::MatcherRegistry;
//! use stylemap_plugins::BreakTypesPlugin;
//!
//! let mut registry = MatcherRegistry::new();
//! registry.register_plugin(&BreakTypesPlugin::new()).unwrap();
//!
//! let options = json!({"sectionType": "nextPage"}).as_object().cloned().unwrap();
//! let matcher = registry.create_matcher("section-break", &options).value.unwrap();
//! let brk = Element::break_of("section").with_field("sectionType", "nextPage");
//! assert!(matcher.matches(&brk));
//! ```

use std::sync::Arc;

use serde_json::Value;
use stylemap_ast::Options;
use stylemap_core::{MatcherRegistry, PluginCatalog, TransformEngine};

pub mod breaks;
pub mod elements;
pub mod script;
pub mod template;

pub use breaks::{BreakTypesPlugin, ConditionalBreakMatcher};
pub use elements::ElementTypesPlugin;
pub use script::{ScriptEngine, ScriptError, ScriptProcessor, SCRIPT_VERSION};
pub use template::{CompiledTemplate, Constraint, ElementTemplate};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Merge rule options over a defaults object; rule options win
pub(crate) fn with_defaults(defaults: Value, options: &Options) -> Options {
    let mut merged = match defaults {
        Value::Object(map) => map,
        _ => Options::new(),
    };
    merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Catalog of the plugins in this crate, keyed by their names
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with(BreakTypesPlugin::NAME, BreakTypesPlugin::boxed)
        .with(ElementTypesPlugin::NAME, ElementTypesPlugin::boxed)
}

/// Add the Rhai backend to a transform engine
pub fn install_script_processor(engine: &mut TransformEngine) -> &mut TransformEngine {
    engine.register_processor(Arc::new(ScriptProcessor::new()))
}

/// Bind a transform engine with the Rhai backend if none is bound, or
/// add the backend to the bound engine while it is not yet shared.
///
/// Returns `false` when an engine is bound but already shared with
/// matchers, in which case nothing changes.
pub fn enable_scripting(registry: &mut MatcherRegistry) -> bool {
    if registry.transform_engine().is_none() {
        let mut engine = TransformEngine::new();
        install_script_processor(&mut engine);
        registry.bind_transform_engine(engine);
        return true;
    }
    match registry.transform_engine_mut() {
        Some(engine) => {
            install_script_processor(engine);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_contains_plugins() {
        let catalog = catalog();
        assert!(catalog.contains("break-types"));
        assert!(catalog.contains("element-types"));
        assert!(catalog.instantiate("missing").is_err());
    }

    #[test]
    fn test_with_defaults_rule_options_win() {
        let options = serde_json::json!({"side": "even", "extra": 1}).as_object().cloned().unwrap();
        let merged = with_defaults(serde_json::json!({"side": "odd", "clear": "any"}), &options);
        assert_eq!(merged["side"], "even");
        assert_eq!(merged["clear"], "any");
        assert_eq!(merged["extra"], 1);
        assert_eq!(with_defaults(Value::Null, &Options::new()).len(), 0);
    }

    #[test]
    fn test_enable_scripting_binds_engine() {
        let mut registry = MatcherRegistry::new();
        assert!(enable_scripting(&mut registry));
        let engine = registry.transform_engine().unwrap();
        assert!(engine.processor_names().iter().any(|n| n == ScriptProcessor::NAME));
    }
}
