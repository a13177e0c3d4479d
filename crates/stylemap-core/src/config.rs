//! Configuration-driven registration
//!
//! A configuration batch-applies plugins, matchers and transform-backed
//! types to a registry. It can be written in TOML or JSON:
//!
//! ```toml
//! plugins = ["breaks"]
//!
//! [matchers.title.template]
//! elementType = "paragraph"
//! conditions = [{ type = "property", property = "styleName", value = "Title" }]
//!
//! [matchers.title.options]
//! priority = 5
//! namespace = "house"
//!
//! [transforms.callout]
//! path = "callout.rhai"
//! options = { label = "Note" }
//!
//! [transform]
//! cache_enabled = true
//! max_cache_size = 50
//! ```
//!
//! Items are applied in the order plugins, matchers, transforms, so
//! explicit configuration overrides plugin registrations of the same
//! type. A failing item is reported and skipped; it never aborts the
//! batch.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stylemap_ast::Options;

use crate::error::{ConfigError, PluginError};
use crate::matcher::BoxedMatcher;
use crate::outcome::{Message, Outcome};
use crate::plugin::PluginCatalog;
use crate::registry::{Factory, MatcherRegistry, RegisterOptions, TransformRegistration};
use crate::template::MatchTemplate;
use crate::transform::{TransformEngine, DEFAULT_CACHE_SIZE};

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Direct registrations by type
    pub matchers: BTreeMap<String, MatcherEntry>,

    /// Transform-backed registrations by type
    #[serde(alias = "xslt_transforms", alias = "xsltTransforms")]
    pub transforms: BTreeMap<String, TransformEntry>,

    /// Plugin names resolved through a [`PluginCatalog`]
    pub plugins: Vec<String>,

    /// Transform engine settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSettings>,

    /// Directory relative transform paths resolve against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl MatcherConfig {
    /// Parse a TOML configuration
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Parse a JSON configuration
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a `.toml` or `.json` file.
    ///
    /// Relative transform paths resolve against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mut config = match extension.as_str() {
            "toml" => Self::from_toml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Add a programmatic factory entry
    pub fn with_factory<F>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Options) -> crate::error::Result<BoxedMatcher> + Send + Sync + 'static,
    {
        self.matchers
            .insert(type_name.into(), MatcherEntry::with_factory(factory));
        self
    }

    /// Add a template entry
    pub fn with_template(mut self, type_name: impl Into<String>, template: MatchTemplate) -> Self {
        self.matchers
            .insert(type_name.into(), MatcherEntry::with_template(template));
        self
    }

    /// Add a plugin name
    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugins.push(name.into());
        self
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match self.base_dir {
            Some(ref base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// A direct registration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherEntry {
    /// Programmatic factory (not serializable)
    #[serde(skip)]
    pub factory: Option<Factory>,

    /// Declarative template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<MatchTemplate>,

    /// Registration metadata
    pub options: EntryOptions,
}

impl MatcherEntry {
    /// Entry backed by a factory
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&Options) -> crate::error::Result<BoxedMatcher> + Send + Sync + 'static,
    {
        Self {
            factory: Some(std::sync::Arc::new(factory)),
            ..Self::default()
        }
    }

    /// Entry backed by a template
    pub fn with_template(template: MatchTemplate) -> Self {
        Self {
            template: Some(template),
            ..Self::default()
        }
    }

    /// Set the registration metadata
    pub fn with_options(mut self, options: EntryOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for MatcherEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherEntry")
            .field("factory", &self.factory.is_some())
            .field("template", &self.template)
            .field("options", &self.options)
            .finish()
    }
}

/// Serializable registration metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryOptions {
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntryOptions {
    fn to_register_options(&self) -> RegisterOptions {
        let mut options = RegisterOptions::default().with_priority(self.priority);
        if let Some(ref namespace) = self.namespace {
            options = options.with_namespace(namespace.clone());
        }
        if let Some(ref description) = self.description {
            options = options.with_description(description.clone());
        }
        options
    }
}

/// A transform-backed registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformEntry {
    /// Template file, registered under the template name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Template name; defaults to the type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Transform parameters
    pub options: Options,
}

/// Transform engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    #[serde(alias = "cacheEnabled")]
    pub cache_enabled: bool,
    #[serde(alias = "maxCacheSize")]
    pub max_cache_size: usize,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// What a configuration load applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub plugins: Vec<String>,
    pub matchers: Vec<String>,
    pub transforms: Vec<String>,
    pub skipped: Vec<String>,
}

impl LoadReport {
    /// Total number of applied items
    pub fn applied(&self) -> usize {
        self.plugins.len() + self.matchers.len() + self.transforms.len()
    }
}

impl MatcherRegistry {
    /// Apply a configuration batch.
    ///
    /// The outcome always carries a report; its messages describe every
    /// skipped item.
    pub fn load_configuration(&mut self, config: &MatcherConfig, catalog: &PluginCatalog) -> Outcome<LoadReport> {
        let mut report = LoadReport::default();
        let mut messages = Vec::new();

        if let Some(ref settings) = config.transform {
            self.apply_transform_settings(settings, &mut messages);
        }

        for name in &config.plugins {
            let applied = self.load_plugin(name, catalog, &mut messages);
            if applied {
                report.plugins.push(name.clone());
            } else {
                report.skipped.push(format!("plugin:{}", name));
            }
        }

        for (type_name, entry) in &config.matchers {
            let options = entry.options.to_register_options();
            match (&entry.factory, &entry.template) {
                (Some(factory), _) => {
                    self.register_factory(type_name, factory.clone(), options);
                }
                (None, Some(template)) => {
                    self.register_template(type_name, template.clone(), options);
                }
                (None, None) => {
                    tracing::warn!("Matcher entry '{}' has neither factory nor template", type_name);
                    let outcome: Outcome<()> = self.diagnostics().handle_validation_error(
                        type_name,
                        &Options::new(),
                        "entry has neither a factory nor a template",
                    );
                    messages.extend(outcome.messages);
                    report.skipped.push(format!("matcher:{}", type_name));
                    continue;
                }
            }
            report.matchers.push(type_name.clone());
        }

        for (type_name, entry) in &config.transforms {
            let template = entry.template.clone().unwrap_or_else(|| type_name.clone());
            let registration = match entry.path {
                Some(ref path) => TransformRegistration::file(template, config.resolve_path(path)),
                None => TransformRegistration::template(template),
            }
            .with_options(entry.options.clone());

            match self.register_transform(type_name, registration) {
                Ok(_) => report.transforms.push(type_name.clone()),
                Err(e) => {
                    tracing::warn!("Skipping transform '{}': {}", type_name, e);
                    let outcome: Outcome<()> = self.diagnostics().handle_xslt_error(type_name, &e);
                    messages.extend(outcome.messages);
                    report.skipped.push(format!("transform:{}", type_name));
                }
            }
        }

        tracing::debug!(
            "Configuration applied: {} items, {} skipped",
            report.applied(),
            report.skipped.len()
        );
        Outcome::success(report).with_prior_messages(messages)
    }

    fn load_plugin(&mut self, name: &str, catalog: &PluginCatalog, messages: &mut Vec<Message>) -> bool {
        let plugin = match catalog.instantiate(name) {
            Ok(plugin) => plugin,
            Err(e) => {
                tracing::warn!("Skipping plugin '{}': {}", name, e);
                let outcome: Outcome<()> = self.diagnostics().handle_plugin_error(name, &e);
                messages.extend(outcome.messages);
                return false;
            }
        };

        // Advisory: the plugin is still registered
        if let Err(e) = plugin.require_dependencies(&self.plugin_names()) {
            tracing::debug!("{}", e);
            let outcome: Outcome<()> = match e {
                PluginError::MissingDependencies { ref missing, .. } => {
                    self.diagnostics().handle_dependency_error(name, missing)
                }
                ref other => self.diagnostics().handle_plugin_error(name, other),
            };
            messages.extend(outcome.messages);
        }

        match self.register_plugin(plugin.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Skipping plugin '{}': {}", name, e);
                let outcome: Outcome<()> = self.diagnostics().handle_plugin_error(name, &e);
                messages.extend(outcome.messages);
                false
            }
        }
    }

    fn apply_transform_settings(&mut self, settings: &TransformSettings, messages: &mut Vec<Message>) {
        if self.transform_engine().is_none() {
            let mut engine = TransformEngine::with_cache_size(settings.max_cache_size);
            engine.set_cache_enabled(settings.cache_enabled);
            self.bind_transform_engine(engine);
            return;
        }

        match self.transform_engine_mut() {
            Some(engine) => {
                engine.set_cache_enabled(settings.cache_enabled);
                engine.set_cache_capacity(settings.max_cache_size);
            }
            None => messages.push(Message::warning(
                "Transform engine is in use; cache settings were not applied",
            )),
        }
    }
}
