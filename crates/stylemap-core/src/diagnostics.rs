//! Diagnostics for style rule compilation
//!
//! This module owns the error taxonomy ([`ErrorCode`] and its
//! [`ErrorCategory`] table), the warning handlers that turn errors into
//! user-facing messages (optionally with a recovery value), the
//! suggestion providers behind "did you mean" hints, and the aggregated
//! [`ErrorReport`].
//!
//! # Example
//!
//! ```
//! use stylemap_core::diagnostics::Diagnostics;
//!
//! let diagnostics = Diagnostics::new();
//! let available = vec!["paragraph".to_string(), "page-break".to_string()];
//!
//! let outcome = diagnostics.handle_unknown_type("paragrap", &available);
//! assert!(outcome.value.is_some()); // recovered with a no-op matcher
//! assert!(outcome.messages[0].text.contains("paragraph"));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stylemap_ast::Options;

use crate::matcher::{BoxedMatcher, NeverMatcher};
use crate::outcome::{Message, Outcome};
use crate::suggest::similarity;

/// Number of suggestions shown in formatted messages
const DISPLAYED_SUGGESTIONS: usize = 3;

/// Error codes of the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A rule references a type nobody registered
    UnknownType,
    /// Options are structurally invalid
    InvalidOptions,
    /// A validation predicate rejected the options
    ValidationFailed,
    /// Plugin registration or execution failed
    PluginError,
    /// Transform invocation failed
    XsltError,
    /// Declared plugin dependencies are missing
    DependencyError,
}

/// Severity of a diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only
    Info,
    /// Degraded but recoverable
    Warning,
    /// The affected rule is dropped
    Error,
    /// The conversion context itself is compromised
    Critical,
}

/// One row of the category table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCategory {
    /// Error code
    pub code: ErrorCode,
    /// Default severity
    pub severity: Severity,
    /// What the category means
    pub description: &'static str,
    /// Whether a substitute value is produced
    pub recoverable: bool,
}

/// The fixed category table
pub static ERROR_CATEGORIES: [ErrorCategory; 6] = [
    ErrorCategory {
        code: ErrorCode::UnknownType,
        severity: Severity::Warning,
        description: "Unknown matcher type",
        recoverable: true,
    },
    ErrorCategory {
        code: ErrorCode::InvalidOptions,
        severity: Severity::Error,
        description: "Invalid matcher options",
        recoverable: false,
    },
    ErrorCategory {
        code: ErrorCode::ValidationFailed,
        severity: Severity::Error,
        description: "Matcher validation failed",
        recoverable: false,
    },
    ErrorCategory {
        code: ErrorCode::PluginError,
        severity: Severity::Error,
        description: "Plugin registration or execution error",
        recoverable: false,
    },
    ErrorCategory {
        code: ErrorCode::XsltError,
        severity: Severity::Error,
        description: "Transform processing error",
        recoverable: false,
    },
    ErrorCategory {
        code: ErrorCode::DependencyError,
        severity: Severity::Warning,
        description: "Missing plugin dependency",
        recoverable: false,
    },
];

impl ErrorCode {
    /// All codes, in table order
    pub fn all() -> [ErrorCode; 6] {
        ERROR_CATEGORIES.map(|c| c.code)
    }

    /// Table row for this code
    pub fn category(self) -> &'static ErrorCategory {
        // The table is indexed in declaration order
        &ERROR_CATEGORIES[self as usize]
    }

    /// Wire name (`UNKNOWN_TYPE`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownType => "UNKNOWN_TYPE",
            ErrorCode::InvalidOptions => "INVALID_OPTIONS",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::PluginError => "PLUGIN_ERROR",
            ErrorCode::XsltError => "XSLT_ERROR",
            ErrorCode::DependencyError => "DEPENDENCY_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A category-tagged error record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchError {
    /// Category code
    pub code: ErrorCode,
    /// Severity (defaults to the category's)
    pub severity: Severity,
    /// Raw message
    pub message: String,
    /// Matcher type, template or plugin the error is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Candidate replacements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Free-form context
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl MatchError {
    /// Create a record with the category's default severity
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.category().severity,
            message: message.into(),
            subject: None,
            suggestions: Vec::new(),
            details: Map::new(),
        }
    }

    /// Set what the error is about
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach suggestions
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Attach a context value
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Category table row
    pub fn category(&self) -> &'static ErrorCategory {
        self.code.category()
    }

    /// Whether the record counts as an error in reports
    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }

    fn subject_or_unknown(&self) -> &str {
        self.subject.as_deref().unwrap_or("<unknown>")
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// Formats errors of one category and optionally recovers from them
pub trait WarningHandler: Send + Sync {
    /// User-facing message for the error
    fn format(&self, error: &MatchError) -> String;

    /// Substitute matcher, for recoverable categories
    fn recovery(&self, _error: &MatchError) -> Option<BoxedMatcher> {
        None
    }
}

/// Unknown types recover to a matcher that never matches
struct UnknownTypeHandler;

impl WarningHandler for UnknownTypeHandler {
    fn format(&self, error: &MatchError) -> String {
        let mut text = format!("Unknown matcher type '{}'", error.subject_or_unknown());
        if !error.suggestions.is_empty() {
            let shown: Vec<_> = error
                .suggestions
                .iter()
                .take(DISPLAYED_SUGGESTIONS)
                .map(String::as_str)
                .collect();
            text.push_str(&format!(". Did you mean: {}?", shown.join(", ")));
        }
        text
    }

    fn recovery(&self, error: &MatchError) -> Option<BoxedMatcher> {
        Some(Box::new(NeverMatcher::because(format!(
            "unknown type '{}'",
            error.subject_or_unknown()
        ))))
    }
}

struct ValidationHandler;

impl WarningHandler for ValidationHandler {
    fn format(&self, error: &MatchError) -> String {
        format!(
            "Invalid options for matcher type '{}': {}",
            error.subject_or_unknown(),
            error.message
        )
    }
}

struct PluginErrorHandler;

impl WarningHandler for PluginErrorHandler {
    fn format(&self, error: &MatchError) -> String {
        format!(
            "Plugin '{}' failed: {}",
            error.subject_or_unknown(),
            error.message
        )
    }
}

struct TransformErrorHandler;

impl WarningHandler for TransformErrorHandler {
    fn format(&self, error: &MatchError) -> String {
        format!(
            "Transform '{}' failed: {}",
            error.subject_or_unknown(),
            error.message
        )
    }
}

/// Produces candidate type names for an unrecognized input
pub trait SuggestionProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Higher priorities are consulted first
    fn priority(&self) -> i32 {
        0
    }

    /// Candidates for `unknown`, given the registered types
    fn suggest(&self, unknown: &str, available: &[String]) -> Vec<String>;
}

/// Prefix, substring and edit-distance candidates
///
/// Results are concatenated in that order without re-ranking.
pub struct FuzzySuggestions;

impl SuggestionProvider for FuzzySuggestions {
    fn name(&self) -> &str {
        "fuzzy"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn suggest(&self, unknown: &str, available: &[String]) -> Vec<String> {
        let needle = unknown.to_lowercase();
        let needle_len = needle.chars().count();
        let lowered: Vec<(String, &String)> = available
            .iter()
            .map(|t| (t.to_lowercase(), t))
            .collect();

        let prefix = lowered
            .iter()
            .filter(|(lower, _)| lower.starts_with(&needle))
            .map(|(_, t)| (*t).clone());

        let substring = lowered
            .iter()
            .filter(|(lower, _)| matches!(lower.find(&needle), Some(index) if index > 0))
            .map(|(_, t)| (*t).clone());

        let close = lowered
            .iter()
            .filter(|(lower, _)| {
                let len = lower.chars().count();
                len.abs_diff(needle_len) <= 2 && similarity(lower, &needle) > 0.5
            })
            .map(|(_, t)| (*t).clone());

        prefix.chain(substring).chain(close).collect()
    }
}

/// Keyword to type-list table, matched by substring containment
pub struct CategorySuggestions {
    table: Vec<(String, Vec<String>)>,
}

impl Default for CategorySuggestions {
    fn default() -> Self {
        let table: &[(&str, &[&str])] = &[
            (
                "break",
                &[
                    "line-break",
                    "page-break",
                    "column-break",
                    "section-break",
                    "text-wrapping-break",
                    "clear-break",
                ],
            ),
            ("para", &["paragraph"]),
            ("table", &["table"]),
            ("run", &["run"]),
            (
                "format",
                &["bold", "italic", "underline", "strikethrough", "highlight"],
            ),
            ("caps", &["all-caps", "small-caps"]),
            ("strike", &["strikethrough"]),
            ("comment", &["comment-reference"]),
            ("form", &["form-field"]),
            ("field", &["form-field"]),
            ("math", &["equation"]),
            ("equation", &["equation"]),
            ("image", &["image", "media"]),
            ("media", &["media", "image"]),
            ("container", &["container"]),
        ];

        Self {
            table: table
                .iter()
                .map(|(keyword, types)| {
                    (
                        keyword.to_string(),
                        types.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl CategorySuggestions {
    /// Add or replace a keyword row
    pub fn with_category(mut self, keyword: impl Into<String>, types: Vec<String>) -> Self {
        let keyword = keyword.into();
        self.table.retain(|(k, _)| *k != keyword);
        self.table.push((keyword, types));
        self
    }
}

impl SuggestionProvider for CategorySuggestions {
    fn name(&self) -> &str {
        "category"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn suggest(&self, unknown: &str, _available: &[String]) -> Vec<String> {
        let lower = unknown.to_lowercase();
        self.table
            .iter()
            .filter(|(keyword, _)| lower.contains(keyword.as_str()))
            .flat_map(|(_, types)| types.iter().cloned())
            .collect()
    }
}

/// Context attached to an error report
pub type ReportContext = Map<String, Value>;

/// Summary counts of an [`ErrorReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Records with severity error or critical
    pub total_errors: usize,
    /// Records with severity warning
    pub total_warnings: usize,
    /// Records with severity critical
    pub critical_errors: usize,
}

/// One record of an [`ErrorReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub recoverable: bool,
}

/// Aggregated batch of diagnostics for external reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub summary: ReportSummary,
    pub details: Vec<ReportDetail>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: ReportContext,
}

impl ErrorReport {
    /// Check whether any record is an error
    pub fn has_errors(&self) -> bool {
        self.summary.total_errors > 0
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} error(s), {} warning(s), {} critical",
            self.summary.total_errors, self.summary.total_warnings, self.summary.critical_errors
        )?;
        for detail in &self.details {
            write!(f, "  {}[{}]: {}", detail.severity, detail.code, detail.message)?;
            if let Some(ref subject) = detail.subject {
                write!(f, " ({})", subject)?;
            }
            writeln!(f)?;
            if !detail.suggestions.is_empty() {
                writeln!(f, "    = help: did you mean {}?", detail.suggestions.join(", "))?;
            }
        }
        Ok(())
    }
}

/// The diagnostics subsystem
///
/// Holds one warning handler per error code and an ordered list of
/// suggestion providers (highest priority first).
pub struct Diagnostics {
    handlers: HashMap<ErrorCode, Box<dyn WarningHandler>>,
    providers: Vec<Box<dyn SuggestionProvider>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Create diagnostics with the default handlers and providers
    pub fn new() -> Self {
        let mut diagnostics = Self::empty();
        diagnostics.register_handler(ErrorCode::UnknownType, Box::new(UnknownTypeHandler));
        diagnostics.register_handler(ErrorCode::ValidationFailed, Box::new(ValidationHandler));
        diagnostics.register_handler(ErrorCode::InvalidOptions, Box::new(ValidationHandler));
        diagnostics.register_handler(ErrorCode::PluginError, Box::new(PluginErrorHandler));
        diagnostics.register_handler(ErrorCode::XsltError, Box::new(TransformErrorHandler));
        diagnostics.add_provider(Box::new(FuzzySuggestions));
        diagnostics.add_provider(Box::new(CategorySuggestions::default()));
        diagnostics
    }

    /// Create diagnostics with no handlers or providers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            providers: Vec::new(),
        }
    }

    /// Install or replace the handler for a code
    pub fn register_handler(&mut self, code: ErrorCode, handler: Box<dyn WarningHandler>) {
        self.handlers.insert(code, handler);
    }

    /// Add a suggestion provider, keeping descending priority order
    pub fn add_provider(&mut self, provider: Box<dyn SuggestionProvider>) {
        self.providers.push(provider);
        // Stable sort: equal priorities keep insertion order
        self.providers.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Provider names in consultation order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Aggregated, order-preserving, deduplicated suggestions
    pub fn suggestions(&self, unknown: &str, available: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.providers
            .iter()
            .flat_map(|p| p.suggest(unknown, available))
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// Build an UNKNOWN_TYPE record with suggestions
    pub fn unknown_type_error(&self, matcher_type: &str, available: &[String]) -> MatchError {
        MatchError::new(
            ErrorCode::UnknownType,
            format!("Unknown matcher type '{}'", matcher_type),
        )
        .with_subject(matcher_type)
        .with_suggestions(self.suggestions(matcher_type, available))
    }

    /// Build a DEPENDENCY_ERROR record
    pub fn dependency_error(&self, plugin: &str, missing: &[String]) -> MatchError {
        MatchError::new(
            ErrorCode::DependencyError,
            format!("Missing dependencies: {}", missing.join(", ")),
        )
        .with_subject(plugin)
        .with_detail("missing", missing.to_vec())
    }

    /// Format a record through its handler, or fall back to its raw message
    pub fn format(&self, error: &MatchError) -> String {
        self.handlers
            .get(&error.code)
            .map(|h| h.format(error))
            .unwrap_or_else(|| error.message.clone())
    }

    /// Turn a record into an outcome, recovering when the handler can
    pub fn resolve(&self, error: &MatchError) -> Outcome<BoxedMatcher> {
        let text = self.format(error);
        let message = if error.is_error() {
            Message::error(text)
        } else {
            Message::warning(text)
        };
        let value = self.handlers.get(&error.code).and_then(|h| h.recovery(error));
        Outcome {
            value,
            messages: vec![message],
        }
    }

    fn report<T>(&self, error: &MatchError) -> Outcome<T> {
        tracing::debug!("{}", error);
        let text = self.format(error);
        if error.is_error() {
            Outcome::error(text)
        } else {
            Outcome::warning(text)
        }
    }

    /// Unknown type: recoverable, yields a no-op matcher plus suggestions
    pub fn handle_unknown_type(&self, matcher_type: &str, available: &[String]) -> Outcome<BoxedMatcher> {
        let error = self.unknown_type_error(matcher_type, available);
        tracing::debug!("{}", error);
        self.resolve(&error)
    }

    /// Unknown type the fallback chain could not resolve.
    ///
    /// No recovery: the message lists every available type.
    pub fn handle_unresolved_type<T>(&self, matcher_type: &str, available: &[String]) -> Outcome<T> {
        let error = MatchError::new(ErrorCode::UnknownType, format!("Unknown matcher type '{}'", matcher_type))
            .with_subject(matcher_type)
            .with_detail("available", available.to_vec());
        tracing::debug!("{}", error);
        Outcome::warning(format!(
            "{}. Available types: {}",
            self.format(&error),
            available.join(", ")
        ))
    }

    /// Options structurally invalid for a type: not recoverable
    pub fn handle_invalid_options<T>(&self, matcher_type: &str, options: &Options, reason: &str) -> Outcome<T> {
        let error = MatchError::new(ErrorCode::InvalidOptions, reason)
            .with_subject(matcher_type)
            .with_detail("options", Value::Object(options.clone()));
        self.report(&error)
    }

    /// Options rejected for a type: not recoverable
    pub fn handle_validation_error<T>(
        &self,
        matcher_type: &str,
        options: &Options,
        reason: &str,
    ) -> Outcome<T> {
        let error = MatchError::new(ErrorCode::ValidationFailed, reason)
            .with_subject(matcher_type)
            .with_detail("options", Value::Object(options.clone()));
        self.report(&error)
    }

    /// Plugin failure: not recoverable
    pub fn handle_plugin_error<T>(&self, plugin: &str, error: &dyn fmt::Display) -> Outcome<T> {
        let error = MatchError::new(ErrorCode::PluginError, error.to_string()).with_subject(plugin);
        self.report(&error)
    }

    /// Transform failure: not recoverable
    pub fn handle_xslt_error<T>(&self, template: &str, error: &dyn fmt::Display) -> Outcome<T> {
        let error = MatchError::new(ErrorCode::XsltError, error.to_string()).with_subject(template);
        self.report(&error)
    }

    /// Missing plugin dependencies: advisory
    pub fn handle_dependency_error<T>(&self, plugin: &str, missing: &[String]) -> Outcome<T> {
        self.report(&self.dependency_error(plugin, missing))
    }

    /// Aggregate a batch of records for external reporting
    pub fn create_error_report(&self, errors: &[MatchError], context: ReportContext) -> ErrorReport {
        let mut summary = ReportSummary::default();
        for error in errors {
            match error.severity {
                Severity::Critical => {
                    summary.total_errors += 1;
                    summary.critical_errors += 1;
                }
                Severity::Error => summary.total_errors += 1,
                Severity::Warning => summary.total_warnings += 1,
                Severity::Info => {}
            }
        }

        let details = errors
            .iter()
            .map(|error| ReportDetail {
                code: error.code,
                severity: error.severity,
                category: error.category().description.to_string(),
                message: self.format(error),
                subject: error.subject.clone(),
                suggestions: error.suggestions.clone(),
                recoverable: error.category().recoverable,
            })
            .collect();

        ErrorReport {
            summary,
            details,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stylemap_ast::Element;

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_category_table_is_indexed_by_code() {
        for code in ErrorCode::all() {
            assert_eq!(code.category().code, code);
        }
        assert_eq!(ErrorCode::UnknownType.category().severity, Severity::Warning);
        assert!(ErrorCode::UnknownType.category().recoverable);
        assert!(!ErrorCode::XsltError.category().recoverable);
    }

    #[test]
    fn test_fuzzy_prefix() {
        let available = types(&["paragraph", "page-break", "run"]);
        let suggestions = FuzzySuggestions.suggest("paragrap", &available);
        assert!(suggestions.contains(&"paragraph".to_string()));
    }

    #[test]
    fn test_fuzzy_order_is_prefix_substring_distance() {
        let available = types(&["italics-off", "non-italic", "italix"]);
        let suggestions = FuzzySuggestions.suggest("italic", &available);
        // prefix, then substring, then edit distance
        assert_eq!(suggestions, types(&["italics-off", "non-italic", "italix"]));
    }

    #[test]
    fn test_fuzzy_is_case_insensitive() {
        let available = types(&["Page-Break"]);
        assert_eq!(
            FuzzySuggestions.suggest("PAGE", &available),
            types(&["Page-Break"])
        );
    }

    #[test]
    fn test_category_suggestions() {
        let suggestions = CategorySuggestions::default().suggest("my-break-thing", &[]);
        assert_eq!(suggestions[0], "line-break");
        assert!(suggestions.contains(&"clear-break".to_string()));
        assert!(CategorySuggestions::default().suggest("xyz", &[]).is_empty());
    }

    #[test]
    fn test_aggregated_suggestions_are_deduplicated() {
        let diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.provider_names(), vec!["fuzzy", "category"]);

        let available = types(&["page-break", "paragraph"]);
        let suggestions = diagnostics.suggestions("page-brek", &available);
        let count = suggestions.iter().filter(|s| *s == "page-break").count();
        assert_eq!(count, 1);
        assert_eq!(suggestions[0], "page-break");
    }

    #[test]
    fn test_handle_unknown_type_recovers() {
        let diagnostics = Diagnostics::new();
        let outcome = diagnostics.handle_unknown_type("paragrap", &types(&["paragraph"]));

        let matcher = outcome.value.expect("recovery matcher");
        assert!(!matcher.matches(&Element::paragraph()));
        assert_eq!(outcome.messages.len(), 1);
        assert!(!outcome.messages[0].is_error());
        assert!(outcome.messages[0].text.contains("Did you mean: paragraph"));
    }

    #[test]
    fn test_non_recoverable_handlers() {
        let diagnostics = Diagnostics::new();

        let validation: Outcome<()> =
            diagnostics.handle_validation_error("bold", &Options::new(), "color is required");
        assert!(validation.value.is_none());
        assert_eq!(
            validation.messages[0].text,
            "Invalid options for matcher type 'bold': color is required"
        );

        let plugin: Outcome<()> = diagnostics.handle_plugin_error("breaks", &"boom");
        assert!(plugin.has_errors());
        assert_eq!(plugin.messages[0].text, "Plugin 'breaks' failed: boom");

        let invalid: Outcome<()> =
            diagnostics.handle_invalid_options("continuous-break", &Options::new(), "'continuous' must be a boolean");
        assert!(invalid.has_errors());
        assert_eq!(
            invalid.messages[0].text,
            "Invalid options for matcher type 'continuous-break': 'continuous' must be a boolean"
        );

        let unresolved: Outcome<()> = diagnostics.handle_unresolved_type("beta", &types(&["alpha", "gamma"]));
        assert!(unresolved.has_warnings());
        assert_eq!(
            unresolved.messages[0].text,
            "Unknown matcher type 'beta'. Available types: alpha, gamma"
        );

        let transform: Outcome<()> = diagnostics.handle_xslt_error("heading", &"bad template");
        assert_eq!(transform.messages[0].text, "Transform 'heading' failed: bad template");

        let dependency: Outcome<()> =
            diagnostics.handle_dependency_error("tables", &types(&["breaks"]));
        assert!(dependency.has_warnings());
    }

    #[test]
    fn test_custom_handler_replaces_default() {
        struct Quiet;
        impl WarningHandler for Quiet {
            fn format(&self, _error: &MatchError) -> String {
                "quiet".to_string()
            }
        }

        let mut diagnostics = Diagnostics::new();
        diagnostics.register_handler(ErrorCode::UnknownType, Box::new(Quiet));
        let outcome = diagnostics.handle_unknown_type("x", &[]);
        assert_eq!(outcome.messages[0].text, "quiet");
        assert!(outcome.value.is_none());
    }

    #[test]
    fn test_error_report() {
        let diagnostics = Diagnostics::new();
        let errors = vec![
            diagnostics.unknown_type_error("bld", &types(&["bold"])),
            MatchError::new(ErrorCode::PluginError, "crashed").with_subject("media"),
            MatchError::new(ErrorCode::XsltError, "no backend")
                .with_subject("heading")
                .with_severity(Severity::Critical),
        ];

        let mut context = ReportContext::new();
        context.insert("document".to_string(), json!("report.docx"));
        let report = diagnostics.create_error_report(&errors, context);

        assert_eq!(report.summary.total_errors, 2);
        assert_eq!(report.summary.total_warnings, 1);
        assert_eq!(report.summary.critical_errors, 1);
        assert!(report.has_errors());
        assert_eq!(report.details[1].message, "Plugin 'media' failed: crashed");
        assert!(report.details[0].recoverable);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["totalErrors"], json!(2));
        assert_eq!(json["details"][0]["code"], json!("UNKNOWN_TYPE"));
        assert_eq!(json["context"]["document"], json!("report.docx"));

        let text = report.to_string();
        assert!(text.starts_with("2 error(s), 1 warning(s), 1 critical"));
        assert!(text.contains("did you mean bold?"));
    }
}
