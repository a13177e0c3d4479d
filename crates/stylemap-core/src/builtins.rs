//! Built-in matcher catalog
//!
//! Every fresh registry carries these types in the `builtin` namespace.
//! Each one wraps the canonical predicate from [`stylemap_ast::predicates`].

use serde_json::Value;
use stylemap_ast::predicates::{self, BreakKind, Formatting, StyleFilter};
use stylemap_ast::{Options, OptionsExt};

use crate::error::{RegistryError, Result};
use crate::matcher::{matcher_fn, BoxedMatcher};
use crate::registry::{MatcherRegistry, RegisterOptions};

/// Namespace of the built-in catalog
pub const BUILTIN_NAMESPACE: &str = "builtin";

/// Structural kinds
pub const STRUCTURAL_TYPES: [&str; 3] = ["paragraph", "run", "table"];

/// All built-in type names
pub fn builtin_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = BreakKind::all().iter().map(|k| k.type_name()).collect();
    types.extend(STRUCTURAL_TYPES);
    types.extend(Formatting::all().iter().map(|f| f.type_name()));
    types
}

/// Register the built-in catalog
pub(crate) fn register_builtins(registry: &mut MatcherRegistry) {
    for &kind in BreakKind::all() {
        registry.register_with(
            kind.type_name(),
            move |_| Ok(matcher_fn(kind.type_name(), move |el| predicates::is_break(el, kind))),
            builtin(format!("{} break", kind.as_str())),
        );
    }

    registry.register_with(
        "paragraph",
        |options| styled("paragraph", options, predicates::is_paragraph),
        builtin("Paragraph, optionally filtered by style"),
    );
    registry.register_with(
        "run",
        |options| styled("run", options, predicates::is_run),
        builtin("Run, optionally filtered by style"),
    );
    registry.register_with(
        "table",
        |options| styled("table", options, predicates::is_table),
        builtin("Table, optionally filtered by style"),
    );

    for &formatting in Formatting::all() {
        if formatting == Formatting::Highlight {
            continue;
        }
        registry.register_with(
            formatting.type_name(),
            move |_| {
                Ok(matcher_fn(formatting.type_name(), move |el| {
                    predicates::has_formatting(el, formatting)
                }))
            },
            builtin(format!("{} formatting", formatting.type_name())),
        );
    }

    registry.register_with(
        Formatting::Highlight.type_name(),
        highlight,
        builtin("Highlighted run, optionally of a given color"),
    );

    tracing::debug!("Registered {} built-in matcher types", builtin_types().len());
}

fn builtin(description: impl Into<String>) -> RegisterOptions {
    RegisterOptions::default()
        .with_namespace(BUILTIN_NAMESPACE)
        .with_description(description)
}

fn styled(
    name: &'static str,
    options: &Options,
    predicate: fn(&stylemap_ast::Element, &StyleFilter) -> bool,
) -> Result<BoxedMatcher> {
    for key in ["styleId", "styleName", "styleNamePrefix"] {
        require_string(options, key)?;
    }
    let filter = StyleFilter::from_options(options);
    Ok(matcher_fn(name, move |el| predicate(el, &filter)))
}

fn highlight(options: &Options) -> Result<BoxedMatcher> {
    require_string(options, "color")?;
    let color = options.str_opt("color").map(str::to_string);
    Ok(matcher_fn("highlight", move |el| {
        predicates::is_highlight(el, color.as_deref())
    }))
}

fn require_string(options: &Options, key: &str) -> Result<()> {
    match options.get(key) {
        None | Some(Value::String(_)) => Ok(()),
        Some(other) => Err(RegistryError::InvalidOptions(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}
