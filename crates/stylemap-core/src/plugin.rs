//! Plugin capability
//!
//! Plugins contribute batches of matcher types to a registry. A concrete
//! plugin implements [`Plugin::info`], [`Plugin::info_mut`],
//! [`Plugin::register`] and [`Plugin::description`]; everything else has a
//! default.
//!
//! Plugins are linked statically. A [`PluginCatalog`] maps plugin names,
//! as written in configuration files, to constructors supplied by the
//! host application.
//!
//! # Example
//!
//! ```
//! use stylemap_core::plugin::{Plugin, PluginInfo};
//! use stylemap_core::{MatcherRegistry, PluginError};
//! use stylemap_core::matcher::matcher_fn;
//!
//! struct Captions {
//!     info: PluginInfo,
//! }
//!
//! impl Plugin for Captions {
//!     fn info(&self) -> &PluginInfo { &self.info }
//!     fn info_mut(&mut self) -> &mut PluginInfo { &mut self.info }
//!     fn description(&self) -> String { "Caption paragraphs".into() }
//!
//!     fn register(&self, registry: &mut MatcherRegistry) -> Result<(), PluginError> {
//!         registry.register("caption", |_| {
//!             Ok(matcher_fn("caption", |el| el.style_name.as_deref() == Some("Caption")))
//!         });
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = MatcherRegistry::new();
//! let plugin = Captions { info: PluginInfo::new("captions", "1.0.0") };
//! registry.register_plugin(&plugin).unwrap();
//! assert!(registry.has_type("caption"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::PluginError;
use crate::registry::MatcherRegistry;

/// Identity and state of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    /// Plugin name
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Names of plugins this one expects to be loaded first
    pub dependencies: Vec<String>,
    /// Enabled flag (informational; see [`Plugin::disable`])
    pub enabled: bool,
}

impl PluginInfo {
    /// Create enabled plugin info without dependencies
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: Vec::new(),
            enabled: true,
        }
    }

    /// Declare a dependency
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

/// Descriptive snapshot of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub enabled: bool,
}

/// The plugin contract
pub trait Plugin: Send + Sync {
    /// Plugin identity and state
    fn info(&self) -> &PluginInfo;

    /// Mutable plugin state
    fn info_mut(&mut self) -> &mut PluginInfo;

    /// Register this plugin's matcher types.
    ///
    /// May be invoked more than once; registrations simply overwrite.
    fn register(&self, registry: &mut MatcherRegistry) -> Result<(), PluginError>;

    /// Human-readable description
    fn description(&self) -> String;

    /// Post-registration hook
    fn initialize(&self, _registry: &mut MatcherRegistry) -> Result<(), PluginError> {
        Ok(())
    }

    /// Plugin name
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Plugin version
    fn version(&self) -> &str {
        &self.info().version
    }

    /// Declared dependencies
    fn dependencies(&self) -> &[String] {
        &self.info().dependencies
    }

    /// Enabled flag
    fn is_enabled(&self) -> bool {
        self.info().enabled
    }

    /// Set the enabled flag
    fn enable(&mut self) {
        self.info_mut().enabled = true;
    }

    /// Clear the enabled flag.
    ///
    /// The registry does not consult this flag: matchers already
    /// registered by the plugin stay registered.
    fn disable(&mut self) {
        self.info_mut().enabled = false;
    }

    /// Declared dependencies absent from `loaded`
    fn missing_dependencies(&self, loaded: &[&str]) -> Vec<String> {
        self.dependencies()
            .iter()
            .filter(|dep| !loaded.contains(&dep.as_str()))
            .cloned()
            .collect()
    }

    /// True iff every declared dependency is in `loaded`
    fn check_dependencies(&self, loaded: &[&str]) -> bool {
        self.missing_dependencies(loaded).is_empty()
    }

    /// Fail with [`PluginError::MissingDependencies`] unless every
    /// declared dependency is in `loaded`
    fn require_dependencies(&self, loaded: &[&str]) -> Result<(), PluginError> {
        let missing = self.missing_dependencies(loaded);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PluginError::MissingDependencies {
                plugin: self.name().to_string(),
                missing,
            })
        }
    }

    /// Descriptive snapshot
    fn metadata(&self) -> PluginMetadata {
        let info = self.info();
        PluginMetadata {
            name: info.name.clone(),
            version: info.version.clone(),
            description: self.description(),
            dependencies: info.dependencies.clone(),
            enabled: info.enabled,
        }
    }
}

/// Constructor for a statically linked plugin
pub type PluginConstructor = fn() -> Box<dyn Plugin>;

/// Plugin names resolvable from configuration
#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: BTreeMap<String, PluginConstructor>,
}

impl PluginCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constructor (builder form)
    pub fn with(mut self, name: impl Into<String>, constructor: PluginConstructor) -> Self {
        self.add(name, constructor);
        self
    }

    /// Add or replace a constructor
    pub fn add(&mut self, name: impl Into<String>, constructor: PluginConstructor) {
        self.entries.insert(name.into(), constructor);
    }

    /// Instantiate a plugin by name
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Plugin>, PluginError> {
        self.entries
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Known plugin names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Check whether a name is known
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.names())
            .finish()
    }
}
