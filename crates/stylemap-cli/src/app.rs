//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use stylemap_ast::{Element, Options};
use stylemap_core::{LoadReport, Matcher, MatcherConfig, MatcherInfo, MatcherRegistry, Message};
use stylemap_plugins::{catalog, enable_scripting};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "STYLEMAP_LOG";

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "stylemap")]
#[command(author, version, about = "Match document elements against style rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered matcher types, highest priority first
    Types {
        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Plugin(s) to load from the built-in catalog
        #[arg(short, long)]
        plugin: Vec<String>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load a configuration and report what was applied
    Check {
        /// Configuration file (TOML or JSON)
        config: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Strict mode: warnings also fail the check
        #[arg(long)]
        strict: bool,
    },

    /// Run rules over a JSON element tree
    Match {
        /// JSON file holding an element or an array of elements
        input: PathBuf,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Plugin(s) to load from the built-in catalog
        #[arg(short, long)]
        plugin: Vec<String>,

        /// Rule as `type` or `type=<json options>`; defaults to every
        /// configured matcher and transform
        #[arg(short, long)]
        rule: Vec<String>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Suggest registered types for a (mistyped) name
    Suggest {
        /// Type name to look up
        name: String,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Plugin(s) to load from the built-in catalog
        #[arg(short, long)]
        plugin: Vec<String>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Types {
            config,
            plugin,
            format,
        } => {
            types_command(config.as_deref(), &plugin, format)?;
        }
        Commands::Check {
            config,
            format,
            strict,
        } => {
            check_command(&config, format, strict)?;
        }
        Commands::Match {
            input,
            config,
            plugin,
            rule,
            format,
        } => {
            match_command(&input, config.as_deref(), &plugin, &rule, format)?;
        }
        Commands::Suggest {
            name,
            config,
            plugin,
            format,
        } => {
            suggest_command(&name, config.as_deref(), &plugin, format)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A registry prepared from a configuration file and plugin names
pub struct LoadedRegistry {
    pub registry: MatcherRegistry,
    pub config: MatcherConfig,
    pub report: LoadReport,
    pub messages: Vec<Message>,
}

/// Build a registry with the Rhai backend, the named catalog plugins and
/// an optional configuration file applied.
pub fn build_registry(config: Option<&Path>, plugins: &[String]) -> Result<LoadedRegistry> {
    let mut config = match config {
        Some(path) => MatcherConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => MatcherConfig::default(),
    };
    for name in plugins {
        if !config.plugins.contains(name) {
            config.plugins.push(name.clone());
        }
    }

    let mut registry = MatcherRegistry::new();
    enable_scripting(&mut registry);
    let (report, messages) = registry.load_configuration(&config, &catalog()).into_parts();

    Ok(LoadedRegistry {
        registry,
        config,
        report: report.unwrap_or_default(),
        messages,
    })
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        eprintln!("{}", message);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Execute the types command
pub fn types_command(config: Option<&Path>, plugins: &[String], format: OutputFormat) -> Result<()> {
    let loaded = build_registry(config, plugins)?;
    let infos: Vec<MatcherInfo> = loaded.registry.types_by_priority();

    match format {
        OutputFormat::Json => print_json(&infos)?,
        OutputFormat::Text => {
            print_messages(&loaded.messages);
            let width = infos.iter().map(|i| i.type_name.len()).max().unwrap_or(0);
            for info in &infos {
                println!(
                    "{:width$}  {:>4}  {:<10}  {}",
                    info.type_name,
                    info.priority,
                    info.namespace,
                    info.description,
                    width = width
                );
            }
            println!();
            println!("{} types", infos.len());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    report: &'a LoadReport,
    messages: &'a [Message],
}

/// Execute the check command
pub fn check_command(config: &Path, format: OutputFormat, strict: bool) -> Result<()> {
    if !config.exists() {
        anyhow::bail!("Configuration file not found: {}", config.display());
    }

    let loaded = build_registry(Some(config), &[])?;
    let errors = loaded.messages.iter().filter(|m| m.is_error()).count();
    let warnings = loaded.messages.len() - errors;

    match format {
        OutputFormat::Json => print_json(&CheckOutput {
            report: &loaded.report,
            messages: &loaded.messages,
        })?,
        OutputFormat::Text => {
            let report = &loaded.report;
            println!("Checked: {}", config.display());
            println!("  plugins:    {}", report.plugins.join(", "));
            println!("  matchers:   {}", report.matchers.join(", "));
            println!("  transforms: {}", report.transforms.join(", "));
            if !report.skipped.is_empty() {
                println!("  skipped:    {}", report.skipped.join(", "));
            }
            for message in &loaded.messages {
                println!("{}", message);
            }
            if loaded.messages.is_empty() {
                println!("✓ {} items applied", report.applied());
            } else {
                println!("Found {} error(s) and {} warning(s)", errors, warnings);
            }
        }
    }

    if errors > 0 {
        anyhow::bail!("Configuration has {} error(s)", errors);
    }
    if strict && warnings > 0 {
        anyhow::bail!("Strict mode: configuration has {} warning(s)", warnings);
    }
    Ok(())
}

/// A rule to run: a type name and its options
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub type_name: String,
    pub options: Options,
}

/// Parse `type` or `type=<json object>`
pub fn parse_rule(spec: &str) -> Result<RuleSpec> {
    let (type_name, options) = match spec.split_once('=') {
        Some((name, json)) => {
            let value: Value = serde_json::from_str(json)
                .with_context(|| format!("Invalid options for rule '{}'", name))?;
            match value {
                Value::Object(options) => (name, options),
                other => anyhow::bail!("Options for rule '{}' must be a JSON object, got {}", name, other),
            }
        }
        None => (spec, Options::new()),
    };

    let type_name = type_name.trim();
    if type_name.is_empty() {
        anyhow::bail!("Rule '{}' has no type name", spec);
    }
    Ok(RuleSpec {
        type_name: type_name.to_string(),
        options,
    })
}

/// Read an element or an array of elements from JSON
pub fn load_elements(path: &Path) -> Result<Vec<Element>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read element file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;

    let elements = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|element| vec![element])
    }
    .with_context(|| format!("Not an element tree: {}", path.display()))?;
    Ok(elements)
}

/// One matched element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementHit {
    /// Child indices from the top level, joined with `/`
    pub path: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
}

/// Result of running one rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub rule: String,
    pub matcher: Option<String>,
    pub hits: Vec<ElementHit>,
    pub messages: Vec<Message>,
}

/// Pre-order walk over `roots` with an explicit stack of index paths
fn collect_hits(matcher: &dyn Matcher, roots: &[Element]) -> Vec<ElementHit> {
    let mut hits = Vec::new();
    let mut stack: Vec<(Vec<usize>, &Element)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(index, element)| (vec![index], element))
        .collect();

    while let Some((path, element)) = stack.pop() {
        if matcher.matches(element) {
            hits.push(ElementHit {
                path: path.iter().map(usize::to_string).collect::<Vec<_>>().join("/"),
                element_type: element.element_type.clone(),
                style_name: element.style_name.clone(),
            });
        }
        for (index, child) in element.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(index);
            stack.push((child_path, child));
        }
    }

    hits
}

/// Run every rule over every element of the trees, in document order
pub fn match_elements(registry: &MatcherRegistry, elements: &[Element], rules: &[RuleSpec]) -> Vec<RuleResult> {
    rules
        .iter()
        .map(|rule| {
            let (matcher, messages) = registry
                .create_matcher(&rule.type_name, &rule.options)
                .into_parts();
            let hits = match matcher {
                Some(ref matcher) => collect_hits(matcher.as_ref(), elements),
                None => Vec::new(),
            };
            RuleResult {
                rule: rule.type_name.clone(),
                matcher: matcher.map(|m| m.describe()),
                hits,
                messages,
            }
        })
        .collect()
}

/// Execute the match command
pub fn match_command(
    input: &Path,
    config: Option<&Path>,
    plugins: &[String],
    rules: &[String],
    format: OutputFormat,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let loaded = build_registry(config, plugins)?;
    let elements = load_elements(input)?;

    let rules: Vec<RuleSpec> = if rules.is_empty() {
        loaded
            .config
            .matchers
            .keys()
            .chain(loaded.config.transforms.keys())
            .map(|name| RuleSpec {
                type_name: name.clone(),
                options: Options::new(),
            })
            .collect()
    } else {
        rules.iter().map(|r| parse_rule(r)).collect::<Result<_>>()?
    };
    if rules.is_empty() {
        anyhow::bail!("No rules to run: pass --rule or a configuration with matchers");
    }

    let results = match_elements(&loaded.registry, &elements, &rules);

    match format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text => {
            print_messages(&loaded.messages);
            for result in &results {
                println!(
                    "{} [{}]: {} match(es)",
                    result.rule,
                    result.matcher.as_deref().unwrap_or("not created"),
                    result.hits.len()
                );
                for hit in &result.hits {
                    match hit.style_name {
                        Some(ref style) => println!("  {}  {} ({})", hit.path, hit.element_type, style),
                        None => println!("  {}  {}", hit.path, hit.element_type),
                    }
                }
                for message in &result.messages {
                    println!("  {}", message);
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct SuggestOutput<'a> {
    name: &'a str,
    registered: bool,
    suggestions: Vec<String>,
}

/// Execute the suggest command
pub fn suggest_command(name: &str, config: Option<&Path>, plugins: &[String], format: OutputFormat) -> Result<()> {
    let loaded = build_registry(config, plugins)?;
    let registry = &loaded.registry;
    let output = SuggestOutput {
        name,
        registered: registry.has_type(name),
        suggestions: registry
            .diagnostics()
            .suggestions(name, &registry.available_types()),
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            print_messages(&loaded.messages);
            if output.registered {
                println!("'{}' is a registered type", name);
            }
            if output.suggestions.is_empty() {
                println!("No suggestions for '{}'", name);
            } else {
                println!("Did you mean: {}", output.suggestions.join(", "));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rule() {
        let plain = parse_rule("page-break").unwrap();
        assert_eq!(plain.type_name, "page-break");
        assert!(plain.options.is_empty());

        let with_options = parse_rule(r#"paragraph={"styleName": "Title"}"#).unwrap();
        assert_eq!(with_options.type_name, "paragraph");
        assert_eq!(with_options.options["styleName"], json!("Title"));

        assert!(parse_rule("paragraph=[1]").is_err());
        assert!(parse_rule("paragraph={").is_err());
        assert!(parse_rule("={}").is_err());
    }

    #[test]
    fn test_match_elements_paths() {
        let registry = MatcherRegistry::new();
        let tree = vec![
            Element::paragraph()
                .with_style_name("Title")
                .with_child(Element::run().with_field("isBold", true)),
            Element::paragraph().with_child(Element::break_of("page")),
        ];
        let rules = vec![parse_rule("bold").unwrap(), parse_rule("page-break").unwrap()];

        let results = match_elements(&registry, &tree, &rules);
        assert_eq!(results[0].hits.len(), 1);
        assert_eq!(results[0].hits[0].path, "0/0");
        assert_eq!(results[1].hits[0].path, "1/0");
        assert_eq!(results[1].hits[0].element_type, "break");
    }

    #[test]
    fn test_hits_follow_document_order() {
        let registry = MatcherRegistry::new();
        let tree = vec![
            Element::paragraph()
                .with_child(Element::paragraph().with_child(Element::paragraph()))
                .with_child(Element::paragraph()),
            Element::paragraph(),
        ];

        let results = match_elements(&registry, &tree, &[parse_rule("paragraph").unwrap()]);
        let paths: Vec<_> = results[0].hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["0", "0/0", "0/0/0", "0/1", "1"]);
    }

    #[test]
    fn test_deep_tree() {
        let mut element = Element::break_of("page");
        for _ in 0..1_000 {
            element = Element::paragraph().with_child(element);
        }

        let results = match_elements(&MatcherRegistry::new(), &[element], &[parse_rule("page-break").unwrap()]);
        assert_eq!(results[0].hits.len(), 1);
        assert_eq!(results[0].hits[0].path.split('/').count(), 1_001);
    }

    #[test]
    fn test_build_registry_with_plugin_names() {
        let loaded = build_registry(None, &["break-types".to_string()]).unwrap();
        assert!(loaded.registry.has_type("section-break"));
        assert_eq!(loaded.report.plugins, vec!["break-types"]);
        assert!(loaded.messages.is_empty());
    }
}
