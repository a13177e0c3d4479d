//! Matcher registry
//!
//! The registry compiles rule specs (`{type, options}`) into matchers.
//! Resolution order for [`MatcherRegistry::create_matcher`]:
//!
//! 1. A direct registration (factory or template). A failing validation
//!    predicate yields a warning and no matcher; a failing factory yields
//!    an `INVALID_OPTIONS` or `VALIDATION_FAILED` error.
//! 2. A transform-backed registration. Without a bound
//!    [`TransformEngine`] this is a matcher that never matches.
//! 3. The fallback chain, first strategy with a value wins.
//! 4. An `UNKNOWN_TYPE` warning listing every available type.
//!
//! Every failure is formatted by the registry's [`Diagnostics`], so custom
//! handlers installed through [`MatcherRegistry::diagnostics_mut`] apply.
//!
//! Registering a type that already exists replaces it. There is no
//! duplicate detection; the last registration wins.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use stylemap_ast::{Element, Options};

use crate::builtins;
use crate::diagnostics::{Diagnostics, ErrorCode, MatchError};
use crate::error::{PluginError, PredicateError, RegistryError, Result, TransformError};
use crate::fallback::{FallbackChain, FallbackContext, FallbackStrategy};
use crate::matcher::{panic_message, BoxedMatcher, NeverMatcher};
use crate::outcome::{Message, Outcome};
use crate::plugin::{Plugin, PluginMetadata};
use crate::template::{EvaluatorTable, MatchTemplate, TemplateMatcher};
use crate::transform::TransformEngine;

/// Matcher factory
pub type Factory = Arc<dyn Fn(&Options) -> Result<BoxedMatcher> + Send + Sync>;

/// Option validation predicate, called with the type name and options
pub type Validation = Arc<dyn Fn(&str, &Options) -> bool + Send + Sync>;

/// Default namespace for registrations
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace reported for transform-backed types
pub const TRANSFORM_NAMESPACE: &str = "transform";

/// Registration metadata
#[derive(Clone)]
pub struct RegisterOptions {
    /// Ordering hint for informational listings
    pub priority: i32,
    /// Grouping label
    pub namespace: String,
    /// Checked before the factory runs
    pub validation: Option<Validation>,
    /// Human-readable description
    pub description: String,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            namespace: DEFAULT_NAMESPACE.to_string(),
            validation: None,
            description: String::new(),
        }
    }
}

impl RegisterOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reject options before the factory is invoked
    pub fn with_validation<F>(mut self, validation: F) -> Self
    where
        F: Fn(&str, &Options) -> bool + Send + Sync + 'static,
    {
        self.validation = Some(Arc::new(validation));
        self
    }
}

impl fmt::Debug for RegisterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterOptions")
            .field("priority", &self.priority)
            .field("namespace", &self.namespace)
            .field("validation", &self.validation.is_some())
            .field("description", &self.description)
            .finish()
    }
}

/// How a registered type builds its matcher
#[derive(Clone)]
pub enum MatcherSource {
    /// Programmatic factory
    Factory(Factory),
    /// Declarative template
    Template(MatchTemplate),
}

/// One entry per registered type
#[derive(Clone)]
pub struct RegisteredMatcher {
    pub source: MatcherSource,
    pub options: RegisterOptions,
}

/// Transform-backed registration
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRegistration {
    /// Template name in the bound engine
    pub template: String,
    /// File the template body was loaded from, if any
    pub path: Option<PathBuf>,
    /// Passed to the transform as parameters
    pub options: Options,
}

impl TransformRegistration {
    /// Refer to a template already registered with the engine
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            template: name.into(),
            path: None,
            options: Options::new(),
        }
    }

    /// Load the template body from a file, registered under `name`
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            template: name.into(),
            path: Some(path.into()),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

/// Kind of registration behind a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Factory,
    Template,
    Transform,
}

/// Metadata view of a registered type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub kind: MatcherKind,
    pub priority: i32,
    pub namespace: String,
    pub description: String,
    pub has_validation: bool,
}

/// Compiles rule specs into matchers
pub struct MatcherRegistry {
    matchers: HashMap<String, RegisteredMatcher>,
    transforms: HashMap<String, TransformRegistration>,
    fallback: FallbackChain,
    evaluators: EvaluatorTable,
    diagnostics: Diagnostics,
    transform_engine: Option<Arc<TransformEngine>>,
    plugins: Vec<PluginMetadata>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MatcherRegistry {
    /// Registry with the built-in catalog and the default fallback chain
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtins::register_builtins(&mut registry);
        registry
    }

    /// Registry with no types, default fallback chain and diagnostics
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
            transforms: HashMap::new(),
            fallback: FallbackChain::default(),
            evaluators: EvaluatorTable::new(),
            diagnostics: Diagnostics::new(),
            transform_engine: None,
            plugins: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Register a factory with default metadata
    pub fn register<F>(&mut self, type_name: &str, factory: F) -> &mut Self
    where
        F: Fn(&Options) -> Result<BoxedMatcher> + Send + Sync + 'static,
    {
        self.register_with(type_name, factory, RegisterOptions::default())
    }

    /// Register a factory with explicit metadata
    pub fn register_with<F>(&mut self, type_name: &str, factory: F, options: RegisterOptions) -> &mut Self
    where
        F: Fn(&Options) -> Result<BoxedMatcher> + Send + Sync + 'static,
    {
        self.register_factory(type_name, Arc::new(factory), options)
    }

    /// Register a shared factory
    pub fn register_factory(&mut self, type_name: &str, factory: Factory, options: RegisterOptions) -> &mut Self {
        self.insert(type_name, MatcherSource::Factory(factory), options)
    }

    /// Register a declarative template
    pub fn register_template(
        &mut self,
        type_name: &str,
        template: MatchTemplate,
        options: RegisterOptions,
    ) -> &mut Self {
        self.insert(type_name, MatcherSource::Template(template), options)
    }

    fn insert(&mut self, type_name: &str, source: MatcherSource, options: RegisterOptions) -> &mut Self {
        if let Some(previous) = self.matchers.get(type_name) {
            tracing::debug!(
                "Replacing matcher type '{}' (namespace '{}' -> '{}')",
                type_name,
                previous.options.namespace,
                options.namespace
            );
        } else {
            tracing::debug!("Registered matcher type '{}'", type_name);
        }
        self.matchers
            .insert(type_name.to_string(), RegisteredMatcher { source, options });
        self
    }

    /// Register a plugin's types, then run its initialization hook.
    ///
    /// A panic in either step becomes [`PluginError::Registration`] or
    /// [`PluginError::Initialization`]. Types registered before the panic
    /// stay registered.
    pub fn register_plugin(&mut self, plugin: &dyn Plugin) -> std::result::Result<(), PluginError> {
        catch_unwind(AssertUnwindSafe(|| plugin.register(self))).unwrap_or_else(|payload| {
            Err(PluginError::Registration {
                plugin: plugin.name().to_string(),
                message: panic_message(payload.as_ref()),
            })
        })?;
        catch_unwind(AssertUnwindSafe(|| plugin.initialize(self))).unwrap_or_else(|payload| {
            Err(PluginError::Initialization {
                plugin: plugin.name().to_string(),
                message: panic_message(payload.as_ref()),
            })
        })?;
        tracing::debug!("Registered plugin '{}' v{}", plugin.name(), plugin.version());

        let metadata = plugin.metadata();
        self.plugins.retain(|p| p.name != metadata.name);
        self.plugins.push(metadata);
        Ok(())
    }

    /// Register a transform-backed type.
    ///
    /// When the registration names a file and an engine is bound, the
    /// template is loaded into the engine now. Without an engine the
    /// registration is recorded and resolves to a never-matching matcher.
    pub fn register_transform(
        &mut self,
        type_name: &str,
        registration: TransformRegistration,
    ) -> std::result::Result<&mut Self, TransformError> {
        if let Some(ref path) = registration.path {
            match self.transform_engine_mut() {
                Some(engine) => {
                    engine.load_template(&registration.template, path)?;
                }
                None => tracing::debug!(
                    "No mutable transform engine; template '{}' not loaded",
                    registration.template
                ),
            }
        }
        tracing::debug!(
            "Registered transform type '{}' -> template '{}'",
            type_name,
            registration.template
        );
        self.transforms.insert(type_name.to_string(), registration);
        Ok(self)
    }

    /// Append a fallback strategy
    pub fn register_fallback_strategy(&mut self, strategy: Box<dyn FallbackStrategy>) -> &mut Self {
        self.fallback.push(strategy);
        self
    }

    /// Insert a fallback strategy at a position
    pub fn insert_fallback_strategy(&mut self, index: usize, strategy: Box<dyn FallbackStrategy>) -> &mut Self {
        self.fallback.insert(index, strategy);
        self
    }

    /// Remove every fallback strategy
    pub fn clear_fallback_strategies(&mut self) -> &mut Self {
        self.fallback.clear();
        self
    }

    /// Fallback strategy names in order
    pub fn fallback_strategy_names(&self) -> Vec<&str> {
        self.fallback.names()
    }

    /// Register a named evaluator for template `custom` conditions
    pub fn register_evaluator<F>(&mut self, name: &str, evaluator: F) -> &mut Self
    where
        F: Fn(&Element, &Options) -> std::result::Result<bool, PredicateError> + Send + Sync + 'static,
    {
        self.evaluators.insert(name.to_string(), Arc::new(evaluator));
        self
    }

    /// Bind a transform engine for transform-backed types
    pub fn bind_transform_engine(&mut self, engine: TransformEngine) -> &mut Self {
        tracing::debug!("Bound transform engine: {:?}", engine);
        self.transform_engine = Some(Arc::new(engine));
        self
    }

    /// The bound transform engine
    pub fn transform_engine(&self) -> Option<&Arc<TransformEngine>> {
        self.transform_engine.as_ref()
    }

    /// Mutable access to the bound engine.
    ///
    /// Only available while no matcher created from it is alive.
    pub fn transform_engine_mut(&mut self) -> Option<&mut TransformEngine> {
        self.transform_engine.as_mut().and_then(Arc::get_mut)
    }

    /// Remove a type, direct or transform-backed
    pub fn unregister(&mut self, type_name: &str) -> bool {
        let direct = self.matchers.remove(type_name).is_some();
        let transform = self.transforms.remove(type_name).is_some();
        direct || transform
    }

    /// The diagnostics subsystem
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Customize the diagnostics subsystem
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Check whether a type is registered (direct or transform-backed)
    pub fn has_type(&self, type_name: &str) -> bool {
        self.matchers.contains_key(type_name) || self.transforms.contains_key(type_name)
    }

    /// Sorted, deduplicated registered type names
    pub fn available_types(&self) -> Vec<String> {
        self.matchers
            .keys()
            .chain(self.transforms.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Metadata for a type
    pub fn matcher_info(&self, type_name: &str) -> Option<MatcherInfo> {
        if let Some(entry) = self.matchers.get(type_name) {
            let kind = match entry.source {
                MatcherSource::Factory(_) => MatcherKind::Factory,
                MatcherSource::Template(_) => MatcherKind::Template,
            };
            return Some(MatcherInfo {
                type_name: type_name.to_string(),
                kind,
                priority: entry.options.priority,
                namespace: entry.options.namespace.clone(),
                description: entry.options.description.clone(),
                has_validation: entry.options.validation.is_some(),
            });
        }

        self.transforms.get(type_name).map(|registration| MatcherInfo {
            type_name: type_name.to_string(),
            kind: MatcherKind::Transform,
            priority: 0,
            namespace: TRANSFORM_NAMESPACE.to_string(),
            description: format!("Transform template '{}'", registration.template),
            has_validation: false,
        })
    }

    /// Metadata for every type, highest priority first, then by name
    pub fn types_by_priority(&self) -> Vec<MatcherInfo> {
        let mut infos: Vec<_> = self
            .available_types()
            .iter()
            .filter_map(|t| self.matcher_info(t))
            .collect();
        infos.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.type_name.cmp(&b.type_name))
        });
        infos
    }

    /// Plugins registered so far, in registration order
    pub fn plugins(&self) -> &[PluginMetadata] {
        &self.plugins
    }

    /// Names of registered plugins
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Compile a rule spec into a matcher.
    ///
    /// Never panics and never returns an error type; every failure is a
    /// message in the outcome.
    pub fn create_matcher(&self, type_name: &str, options: &Options) -> Outcome<BoxedMatcher> {
        if let Some(entry) = self.matchers.get(type_name) {
            return self.create_direct(type_name, entry, options);
        }

        if let Some(registration) = self.transforms.get(type_name) {
            return self.create_transform(type_name, registration, options);
        }

        let available = self.available_types();
        let context = FallbackContext {
            available_types: &available,
            diagnostics: &self.diagnostics,
        };
        let outcome = self.fallback.resolve(type_name, options, &context);
        if outcome.value.is_some() {
            return outcome;
        }

        tracing::warn!("No matcher for type '{}'", type_name);
        let unresolved: Outcome<BoxedMatcher> = self.diagnostics.handle_unresolved_type(type_name, &available);
        let mut outcome = outcome;
        outcome.messages.extend(unresolved.messages);
        outcome
    }

    fn create_direct(&self, type_name: &str, entry: &RegisteredMatcher, options: &Options) -> Outcome<BoxedMatcher> {
        if let Some(ref validate) = entry.options.validation {
            let valid = catch_unwind(AssertUnwindSafe(|| validate(type_name, options))).unwrap_or_else(|payload| {
                tracing::warn!(
                    "Validation for '{}' panicked: {}",
                    type_name,
                    panic_message(payload.as_ref())
                );
                false
            });
            if !valid {
                let error = MatchError::new(ErrorCode::ValidationFailed, "options rejected by validation")
                    .with_subject(type_name);
                return Outcome::warning(self.diagnostics.format(&error));
            }
        }

        match entry.source {
            MatcherSource::Factory(ref factory) => {
                match catch_unwind(AssertUnwindSafe(|| factory(options))) {
                    Ok(Ok(matcher)) => Outcome::success(matcher),
                    Ok(Err(RegistryError::InvalidOptions(reason))) => {
                        tracing::warn!("Factory for '{}' rejected its options: {}", type_name, reason);
                        self.diagnostics.handle_invalid_options(type_name, options, &reason)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Factory for '{}' failed: {}", type_name, e);
                        self.diagnostics
                            .handle_validation_error(type_name, options, &e.to_string())
                    }
                    Err(payload) => {
                        let reason = panic_message(payload.as_ref());
                        tracing::warn!("Factory for '{}' panicked: {}", type_name, reason);
                        self.diagnostics.handle_validation_error(
                            type_name,
                            options,
                            &format!("factory panicked: {}", reason),
                        )
                    }
                }
            }
            MatcherSource::Template(ref template) => {
                Outcome::success(Box::new(TemplateMatcher::new(template.clone(), &self.evaluators)) as BoxedMatcher)
            }
        }
    }

    fn create_transform(
        &self,
        type_name: &str,
        registration: &TransformRegistration,
        options: &Options,
    ) -> Outcome<BoxedMatcher> {
        let Some(ref engine) = self.transform_engine else {
            return Outcome::success(Box::new(NeverMatcher::because("no transform backend")) as BoxedMatcher)
                .with_message(Message::warning(format!(
                    "Transform type '{}' has no transform engine bound; the rule will never match",
                    type_name
                )));
        };

        let mut params = registration.options.clone();
        params.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        engine.create_matcher(&registration.template, &params)
    }
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherRegistry")
            .field("types", &self.available_types())
            .field("fallback", &self.fallback_strategy_names())
            .field("evaluators", &self.evaluators.len())
            .field("plugins", &self.plugin_names())
            .finish()
    }
}
