//! Rhai scripting for matchers and transforms
//!
//! Scripts run in a sandboxed [`rhai::Engine`] with operation, depth and
//! size limits. Two entry points use it:
//!
//! - [`ScriptEngine::eval_predicate`] evaluates a boolean expression over
//!   an element (`element`), a value (`value`) and options (`options`).
//! - [`ScriptProcessor`] is a transform backend: the template body is a
//!   script receiving `xml`, `params` and `namespaces`.
//!
//! # Example
//!
//! ```
//! use stylemap_ast::{Element, Options};
//! use stylemap_plugins::script::ScriptEngine;
//!
//! let engine = ScriptEngine::new();
//! let ast = engine.compile(r#"element.styleName == "Title""#).unwrap();
//! let title = Element::paragraph().with_style_name("Title");
//! assert!(engine.eval_predicate(&ast, &title, None, &Options::new()).unwrap());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use stylemap_ast::{Element, Options};
use stylemap_core::transform::{Params, TransformOutput, TransformProcessor, TransformTemplate};
use stylemap_core::TransformError;
use thiserror::Error;

/// Template version handled by [`ScriptProcessor`]
pub const SCRIPT_VERSION: &str = "rhai";

/// Errors raised while compiling or running scripts
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Script compilation failed
    #[error("Script compilation error: {0}")]
    CompileError(String),

    /// Script execution failed
    #[error("Script execution error: {0}")]
    ExecutionError(String),

    /// Script returned something other than the expected type
    #[error("Script must return {expected}, got {actual}")]
    InvalidReturnType {
        expected: &'static str,
        actual: String,
    },
}

/// Result type for script operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Sandboxed Rhai engine with matcher helpers
pub struct ScriptEngine {
    engine: Engine,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    /// Create an engine with safety limits and helpers registered
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(64);
        engine.set_max_operations(100_000);
        engine.set_max_modules(10);
        engine.set_max_string_size(1_000_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);

        Self::register_helpers(&mut engine);

        Self { engine }
    }

    fn register_helpers(engine: &mut Engine) {
        // Case-insensitive containment
        engine.register_fn("contains_ci", |haystack: &str, needle: &str| -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        });

        // Case-insensitive equality
        engine.register_fn("eq_ci", |a: &str, b: &str| -> bool { a.eq_ignore_ascii_case(b) });

        // Regex test; an invalid pattern never matches
        engine.register_fn("matches_regex", |text: &str, pattern: &str| -> bool {
            Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false)
        });

        // First value of an attribute in serialized XML, or ""
        engine.register_fn("xml_attr", |xml: &str, name: &str| -> String {
            xml_attribute(xml, name).unwrap_or_default()
        });

        // Root tag of serialized XML, or ""
        engine.register_fn("xml_tag", |xml: &str| -> String { xml_root_tag(xml).unwrap_or_default() });
    }

    /// Compile a script
    pub fn compile(&self, script: &str) -> Result<AST> {
        self.engine
            .compile(script)
            .map_err(|e| ScriptError::CompileError(e.to_string()))
    }

    /// Evaluate a boolean script over an element.
    ///
    /// The scope holds `element` (the serialized element), `value` (the
    /// constrained value, or unit) and `options`.
    pub fn eval_predicate(
        &self,
        ast: &AST,
        element: &Element,
        value: Option<&Value>,
        options: &Options,
    ) -> Result<bool> {
        let mut scope = Scope::new();
        scope.push_constant("element", to_dynamic(element)?);
        scope.push_constant(
            "value",
            match value {
                Some(v) => to_dynamic(v)?,
                None => Dynamic::UNIT,
            },
        );
        scope.push_constant("options", to_dynamic(options)?);

        let result = self.eval(&mut scope, ast)?;
        result
            .as_bool()
            .map_err(|actual| ScriptError::InvalidReturnType {
                expected: "a boolean",
                actual: actual.to_string(),
            })
    }

    fn eval(&self, scope: &mut Scope<'_>, ast: &AST) -> Result<Dynamic> {
        self.engine
            .eval_ast_with_scope::<Dynamic>(scope, ast)
            .map_err(|e| ScriptError::ExecutionError(e.to_string()))
    }
}

fn to_dynamic<T: serde::Serialize>(value: &T) -> Result<Dynamic> {
    rhai::serde::to_dynamic(value)
        .map_err(|e| ScriptError::ExecutionError(format!("Failed to convert value: {}", e)))
}

fn xml_attribute(xml: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"\s{}="([^"]*)""#, regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn xml_root_tag(xml: &str) -> Option<String> {
    let re = Regex::new(r"<([A-Za-z_][\w.\-]*)").ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Transform backend running Rhai template bodies.
///
/// Handles templates of version `rhai`. A boolean result is a match
/// decision; strings and numbers are returned as text.
pub struct ScriptProcessor {
    engine: Arc<ScriptEngine>,
    compiled: Mutex<HashMap<String, Arc<AST>>>,
}

impl Default for ScriptProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptProcessor {
    /// Processor name
    pub const NAME: &'static str = "rhai";

    pub fn new() -> Self {
        Self::with_engine(Arc::new(ScriptEngine::new()))
    }

    /// Share an existing engine
    pub fn with_engine(engine: Arc<ScriptEngine>) -> Self {
        Self {
            engine,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    fn compiled(&self, template: &TransformTemplate) -> std::result::Result<Arc<AST>, TransformError> {
        if let Some(ast) = self
            .compiled
            .lock()
            .ok()
            .and_then(|cache| cache.get(&template.body).cloned())
        {
            return Ok(ast);
        }

        let ast = Arc::new(self.engine.compile(&template.body).map_err(|e| self.error(e))?);
        if let Ok(mut cache) = self.compiled.lock() {
            cache.insert(template.body.clone(), Arc::clone(&ast));
        }
        Ok(ast)
    }

    fn error(&self, e: ScriptError) -> TransformError {
        TransformError::Processor {
            processor: Self::NAME.to_string(),
            message: e.to_string(),
        }
    }
}

impl TransformProcessor for ScriptProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports(&self) -> Vec<String> {
        vec![SCRIPT_VERSION.to_string()]
    }

    fn transform(
        &self,
        xml: &str,
        template: &TransformTemplate,
        params: &Params,
    ) -> std::result::Result<TransformOutput, TransformError> {
        let ast = self.compiled(template)?;

        let mut scope = Scope::new();
        scope.push_constant("xml", xml.to_string());
        scope.push_constant("params", to_dynamic(params).map_err(|e| self.error(e))?);
        scope.push_constant(
            "namespaces",
            to_dynamic(&template.namespaces).map_err(|e| self.error(e))?,
        );

        let result = self.engine.eval(&mut scope, &ast).map_err(|e| self.error(e))?;

        if let Ok(b) = result.as_bool() {
            return Ok(TransformOutput::Bool(b));
        }
        if result.is_string() {
            return result
                .into_string()
                .map(TransformOutput::Text)
                .map_err(|actual| self.error(ScriptError::InvalidReturnType {
                    expected: "a string",
                    actual: actual.to_string(),
                }));
        }
        if result.is_int() || result.is_float() {
            return Ok(TransformOutput::Text(result.to_string()));
        }

        Err(self.error(ScriptError::InvalidReturnType {
            expected: "a boolean, string or number",
            actual: result.type_name().to_string(),
        }))
    }
}
