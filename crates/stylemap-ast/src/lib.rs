//! stylemap-ast - Document element model
//!
//! This crate provides the element tree that style rules are matched
//! against, together with the canonical predicates for the built-in
//! element kinds (paragraphs, runs, tables, breaks and formatting).
//!
//! Elements are produced by a document reader and are only ever read by
//! matchers.
//!
//! # Example
//!
//! ```
//! use stylemap_ast::{predicates, Element};
//!
//! let para = Element::paragraph().with_style_name("Title");
//! let filter = predicates::StyleFilter::default().with_style_name("title");
//!
//! assert!(predicates::is_paragraph(&para, &filter));
//! ```

pub mod element;
pub mod options;
pub mod predicates;

pub use element::{Element, Walk};
pub use options::{OptionsExt, Options};
pub use serde_json::Value;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
