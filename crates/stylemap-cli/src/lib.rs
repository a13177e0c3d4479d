//! stylemap CLI - Command-line interface library
//!
//! This library provides the CLI functionality for stylemap, including:
//! - Types: list the registered matcher types
//! - Check: validate a rule configuration
//! - Match: run rules over a JSON element tree
//! - Suggest: find registered types close to a name
//!
//! # Library Usage
//!
//! ```ignore
//! use stylemap_cli::{build_registry, load_elements, match_elements, parse_rule};
//!
//! let loaded = build_registry(Some(config.as_path()), &[])?;
//! let elements = load_elements(&input)?;
//! let rules = vec![parse_rule(r#"paragraph={"styleName": "Title"}"#)?];
//! let results = match_elements(&loaded.registry, &elements, &rules);
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # List types, including a catalog plugin
//! stylemap types --plugin break-types
//!
//! # Validate a configuration
//! stylemap check rules.toml --strict
//!
//! # Run rules over an element tree
//! stylemap match document.json --config rules.toml --format json
//!
//! # Suggest types for a typo
//! stylemap suggest paragrap
//! ```
//!
//! Logging goes to stderr and is filtered through `STYLEMAP_LOG`
//! (default `warn`).

pub mod app;

// Re-export main entry point and types
pub use app::{check_command, match_command, suggest_command, types_command};
pub use app::{
    build_registry, load_elements, match_elements, parse_rule, run_cli, ElementHit, LoadedRegistry,
    OutputFormat, RuleResult, RuleSpec, LOG_ENV,
};
