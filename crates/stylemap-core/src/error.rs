//! Error types for the matcher engine
//!
//! These are the typed errors raised inside the engine. At the registry
//! and transform boundaries they are folded into [`crate::Outcome`]
//! messages, so callers of `create_matcher` never see them directly.

use thiserror::Error;

/// Errors raised while registering or creating matchers
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A matcher factory rejected its options or failed
    #[error("Matcher factory failed: {0}")]
    Factory(String),

    /// Options were structurally invalid for the matcher type
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Errors raised by plugins
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin's `register` step failed or panicked
    #[error("Plugin '{plugin}' failed to register: {message}")]
    Registration { plugin: String, message: String },

    /// The plugin's `initialize` step failed or panicked
    #[error("Plugin '{plugin}' failed to initialize: {message}")]
    Initialization { plugin: String, message: String },

    /// No plugin with this name is known to the catalog
    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// Declared dependencies are not loaded
    #[error("Plugin '{plugin}' is missing dependencies: {}", missing.join(", "))]
    MissingDependencies {
        plugin: String,
        missing: Vec<String>,
    },
}

/// Errors raised by the transform extension
#[derive(Error, Debug)]
pub enum TransformError {
    /// No template registered under this name
    #[error("Transform template not found: {0}")]
    TemplateNotFound(String),

    /// No processor registered under this name
    #[error("Transform processor not found: {0}")]
    ProcessorNotFound(String),

    /// No registered processor supports the template version
    #[error("No transform processor supports version {version} (template '{template}')")]
    NoProcessor { template: String, version: String },

    /// The processor failed
    #[error("Processor '{processor}' failed: {message}")]
    Processor { processor: String, message: String },

    /// Element could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Template file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither `.toml` nor `.json`
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Failure of a user-supplied predicate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    /// The predicate reported an error
    #[error("Predicate failed: {0}")]
    Failed(String),

    /// The predicate panicked (caught via catch_unwind)
    #[error("Predicate panicked: {0}")]
    Panicked(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependencies_display() {
        let err = PluginError::MissingDependencies {
            plugin: "tables".to_string(),
            missing: vec!["breaks".to_string(), "elements".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Plugin 'tables' is missing dependencies: breaks, elements"
        );
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::InvalidOptions("'side' must be a string".to_string());
        assert_eq!(err.to_string(), "Invalid options: 'side' must be a string");
    }
}
