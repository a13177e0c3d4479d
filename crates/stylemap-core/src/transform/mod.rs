//! Transform extension for complex matching
//!
//! Some rules are easier to express as a transform over the element than
//! as a predicate. This module keeps two registries, processors
//! (pluggable backends) and templates (named specs bound to a processor,
//! default parameters and namespaces), and runs transforms through a
//! bounded result cache.
//!
//! # Architecture
//!
//! ```text
//! Element ──serialize──▶ XML ──processor(template, params)──▶ output ──parse──▶ bool
//!                                   ▲
//!                    cache (sha256 of xml, processor, template, params)
//! ```
//!
//! No backend ships with the engine. Backends are registered explicitly;
//! with none registered every transform-backed matcher is a non-match.

mod cache;
mod xml;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stylemap_ast::{Element, Options};

use crate::error::TransformError;
use crate::matcher::{panic_message, BoxedMatcher, Matcher};
use crate::outcome::{Message, Outcome};

pub use cache::{cache_key, CacheStats, TransformCache, DEFAULT_CACHE_SIZE};
pub use xml::{element_to_xml, parse_match_result};

/// Transform parameters (sorted, so serialization is deterministic)
pub type Params = BTreeMap<String, Value>;

/// Default template version
pub const DEFAULT_VERSION: &str = "1.0";

/// Output of a processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformOutput {
    /// Native boolean decision
    Bool(bool),
    /// Textual output (markup or a literal)
    Text(String),
}

impl fmt::Display for TransformOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOutput::Bool(b) => write!(f, "{}", b),
            TransformOutput::Text(s) => f.write_str(s),
        }
    }
}

/// A named transform spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformTemplate {
    /// Template name
    pub name: String,
    /// Template source, interpreted by the processor
    pub body: String,
    /// Default processor; auto-selected by version when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    /// Parameters merged under call-site parameters
    #[serde(default)]
    pub default_parameters: Params,
    /// Namespace prefixes available to the body
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    /// Format version of the body
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl TransformTemplate {
    /// Create a template with default version and no parameters
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            processor: None,
            default_parameters: Params::new(),
            namespaces: BTreeMap::new(),
            version: default_version(),
        }
    }

    /// Load the body from a file.
    ///
    /// The file extension names the format version (`callout.rhai` is a
    /// `rhai` template). `.xsl`, `.xslt` and extension-less files keep the
    /// default version.
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, TransformError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path)?;
        let template = Self::new(name, body);
        match path.extension().and_then(|e| e.to_str()) {
            None | Some("xsl") | Some("xslt") => Ok(template),
            Some(extension) => Ok(template.with_version(extension.to_ascii_lowercase())),
        }
    }

    /// Bind a default processor
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    /// Set a default parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_parameters.insert(name.into(), value.into());
        self
    }

    /// Declare a namespace prefix
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Set the format version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// A transform backend
pub trait TransformProcessor: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Template format versions this backend understands
    fn supports(&self) -> Vec<String>;

    /// Higher priorities win auto-selection
    fn priority(&self) -> i32 {
        0
    }

    /// Run the template over the input
    fn transform(
        &self,
        xml: &str,
        template: &TransformTemplate,
        params: &Params,
    ) -> Result<TransformOutput, TransformError>;

    /// Check version support
    fn supports_version(&self, version: &str) -> bool {
        self.supports().iter().any(|v| v == version)
    }
}

/// Per-call transform options
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Processor override
    pub processor: Option<String>,
    /// Consult and fill the cache
    pub use_cache: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            processor: None,
            use_cache: true,
        }
    }
}

impl TransformOptions {
    /// Force a specific processor
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    /// Bypass the cache for this call
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Processor and template registries plus the result cache
pub struct TransformEngine {
    processors: HashMap<String, Arc<dyn TransformProcessor>>,
    templates: HashMap<String, TransformTemplate>,
    cache: Mutex<TransformCache>,
    cache_enabled: bool,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine {
    /// Engine with no processors and the default cache size
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Engine with a specific cache size
    pub fn with_cache_size(capacity: usize) -> Self {
        Self {
            processors: HashMap::new(),
            templates: HashMap::new(),
            cache: Mutex::new(TransformCache::new(capacity)),
            cache_enabled: true,
        }
    }

    /// Turn caching on or off
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    /// Resize the cache, evicting the oldest results that no longer fit
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        tracing::debug!("Transform cache capacity set to {}", capacity);
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .set_capacity(capacity);
    }

    /// Register or replace a processor
    pub fn register_processor(&mut self, processor: Arc<dyn TransformProcessor>) -> &mut Self {
        tracing::debug!("Registered transform processor: {}", processor.name());
        self.processors
            .insert(processor.name().to_string(), processor);
        self
    }

    /// Register or replace a template
    pub fn register_template(&mut self, template: TransformTemplate) -> &mut Self {
        tracing::debug!("Registered transform template: {}", template.name);
        self.templates.insert(template.name.clone(), template);
        self
    }

    /// Load a template body from a file and register it
    pub fn load_template(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<&mut Self, TransformError> {
        let template = TransformTemplate::from_file(name, path)?;
        Ok(self.register_template(template))
    }

    /// Look up a template
    pub fn template(&self, name: &str) -> Option<&TransformTemplate> {
        self.templates.get(name)
    }

    /// Check whether a template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Registered processor names, sorted
    pub fn processor_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered template names, sorted
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    /// Drop all cached results
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Pick the processor for a template.
    ///
    /// An explicit override wins, then the template's default; otherwise
    /// the highest-priority processor supporting the template version
    /// (ties broken by name).
    fn resolve_processor(
        &self,
        template: &TransformTemplate,
        requested: Option<&str>,
    ) -> Result<Arc<dyn TransformProcessor>, TransformError> {
        if let Some(name) = requested.or(template.processor.as_deref()) {
            return self
                .processors
                .get(name)
                .cloned()
                .ok_or_else(|| TransformError::ProcessorNotFound(name.to_string()));
        }

        let mut candidates: Vec<_> = self
            .processors
            .values()
            .filter(|p| p.supports_version(&template.version))
            .collect();
        candidates.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        candidates
            .first()
            .map(|p| Arc::clone(p))
            .ok_or_else(|| TransformError::NoProcessor {
                template: template.name.clone(),
                version: template.version.clone(),
            })
    }

    /// Run a template over XML input.
    ///
    /// Call-site parameters override the template defaults. Failures are
    /// reported as error messages, never propagated.
    pub fn transform(
        &self,
        xml: &str,
        template_name: &str,
        params: &Params,
        options: &TransformOptions,
    ) -> Outcome<TransformOutput> {
        let Some(template) = self.templates.get(template_name) else {
            return Outcome::error(TransformError::TemplateNotFound(template_name.to_string()).to_string());
        };

        let processor = match self.resolve_processor(template, options.processor.as_deref()) {
            Ok(processor) => processor,
            Err(e) => return Outcome::error(e.to_string()),
        };

        let use_cache = self.cache_enabled && options.use_cache;
        let key = cache_key(xml, template, processor.name(), params);
        if use_cache {
            if let Some(hit) = self.cache.lock().ok().and_then(|mut cache| cache.get(&key)) {
                tracing::debug!("Transform cache hit for '{}'", template_name);
                return Outcome::success(hit);
            }
        }

        let mut merged = template.default_parameters.clone();
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let result = catch_unwind(AssertUnwindSafe(|| processor.transform(xml, template, &merged)))
            .unwrap_or_else(|payload| {
                Err(TransformError::Processor {
                    processor: processor.name().to_string(),
                    message: format!("panicked: {}", panic_message(payload.as_ref())),
                })
            });

        match result {
            Ok(output) => {
                if use_cache {
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(key, output.clone());
                    }
                }
                Outcome::success(output)
            }
            Err(e) => {
                tracing::warn!(
                    "Transform '{}' failed in processor '{}': {}",
                    template_name,
                    processor.name(),
                    e
                );
                Outcome::error(format!("Transform '{}' failed: {}", template_name, e))
            }
        }
    }

    /// Build a fail-closed matcher for a template.
    ///
    /// String and scalar options become call-site parameters, except the
    /// reserved `processor` key which selects the backend.
    pub fn create_matcher(self: &Arc<Self>, template_name: &str, options: &Options) -> Outcome<BoxedMatcher> {
        let mut params = Params::new();
        let mut transform_options = TransformOptions::default();
        for (key, value) in options {
            match (key.as_str(), value) {
                ("processor", Value::String(name)) => {
                    transform_options = transform_options.with_processor(name.clone())
                }
                ("cache", Value::Bool(false)) => transform_options = transform_options.without_cache(),
                _ => {
                    params.insert(key.clone(), value.clone());
                }
            }
        }

        let matcher: BoxedMatcher = Box::new(TransformMatcher {
            engine: Arc::clone(self),
            template: template_name.to_string(),
            params,
            options: transform_options,
        });

        if self.has_template(template_name) {
            Outcome::success(matcher)
        } else {
            Outcome::success(matcher).with_message(Message::warning(format!(
                "Transform template '{}' is not registered; the rule will never match",
                template_name
            )))
        }
    }
}

impl fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEngine")
            .field("processors", &self.processor_names())
            .field("templates", &self.template_names())
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}

/// Matcher that delegates to a transform template.
///
/// Any failure (serialization, transform, parse) is a non-match.
pub struct TransformMatcher {
    engine: Arc<TransformEngine>,
    template: String,
    params: Params,
    options: TransformOptions,
}

impl Matcher for TransformMatcher {
    fn matches(&self, element: &Element) -> bool {
        let xml = match element_to_xml(element) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::debug!("Could not serialize element for '{}': {}", self.template, e);
                return false;
            }
        };

        let outcome = self
            .engine
            .transform(&xml, &self.template, &self.params, &self.options);
        match outcome.value {
            Some(ref output) => parse_match_result(output),
            None => {
                for message in &outcome.messages {
                    tracing::debug!("{}", message);
                }
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("transform({})", self.template)
    }
}
