//! stylemap-core - Style rule matcher engine
//!
//! This crate compiles style rules (`{type, options}` specs) into
//! matchers that test document elements. It provides:
//!
//! - A matcher registry with a built-in catalog, declarative templates and
//!   last-write-wins registration
//! - A fallback chain for unknown types (degrade to "never matches")
//! - Diagnostics with an error taxonomy, suggestions and reports
//! - A plugin capability with statically linked plugin catalogs
//! - An optional transform extension with pluggable backends and a
//!   bounded result cache
//!
//! # Example
//!
//! ```
//! use stylemap_ast::{Element, Options};
//! use stylemap_core::MatcherRegistry;
//!
//! let registry = MatcherRegistry::new();
//!
//! let outcome = registry.create_matcher("page-break", &Options::new());
//! let matcher = outcome.value.expect("built-in type");
//! assert!(matcher.matches(&Element::break_of("page")));
//!
//! // Unknown types never fail; they degrade to a matcher that matches nothing
//! let unknown = registry.create_matcher("sparkles", &Options::new());
//! assert!(!unknown.value.as_ref().unwrap().matches(&Element::paragraph()));
//! assert!(unknown.has_warnings());
//! ```

pub mod builtins;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fallback;
pub mod matcher;
pub mod outcome;
pub mod plugin;
pub mod registry;
pub mod suggest;
pub mod template;
pub mod transform;

pub use config::{LoadReport, MatcherConfig, MatcherEntry};
pub use diagnostics::{Diagnostics, ErrorCode, ErrorReport, MatchError, Severity};
pub use error::{ConfigError, PluginError, PredicateError, RegistryError, TransformError};
pub use fallback::{DiagnosticFallback, FallbackChain, FallbackStrategy, IgnoreUnknown, SuggestAlternatives};
pub use matcher::{BoxedMatcher, ConditionalMatcher, Matcher, NeverMatcher};
pub use outcome::{Message, MessageKind, Outcome};
pub use plugin::{Plugin, PluginCatalog, PluginInfo};
pub use registry::{MatcherInfo, MatcherRegistry, RegisterOptions, TransformRegistration};
pub use template::{Condition, MatchTemplate};
pub use transform::{TransformEngine, TransformOutput, TransformProcessor, TransformTemplate};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
