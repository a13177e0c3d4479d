//! Fallback chain for unrecognized matcher types
//!
//! When a type has neither a direct nor a transform-backed registration,
//! the registry walks its fallback strategies in order. The first strategy
//! that produces a matcher wins; strategy order is the only conflict
//! resolution for unknown types.
//!
//! The default chain is `ignore-unknown` followed by
//! `suggest-alternatives`, so unknown types degrade to "never matches"
//! with a warning. A strategy that panics is skipped and reported as a
//! `PLUGIN_ERROR`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use stylemap_ast::Options;

use crate::diagnostics::Diagnostics;
use crate::matcher::{panic_message, BoxedMatcher, NeverMatcher};
use crate::outcome::{Message, Outcome};

/// What a strategy may inspect besides the failing spec
#[derive(Clone, Copy)]
pub struct FallbackContext<'a> {
    /// Sorted, deduplicated registered type names
    pub available_types: &'a [String],
    /// The registry's diagnostics, with any custom handlers
    pub diagnostics: &'a Diagnostics,
}

/// A strategy in the fallback chain
pub trait FallbackStrategy: Send + Sync {
    /// Strategy name
    fn name(&self) -> &str;

    /// Try to produce a matcher for an unrecognized type
    fn handle(
        &self,
        matcher_type: &str,
        options: &Options,
        context: &FallbackContext<'_>,
    ) -> Outcome<BoxedMatcher>;
}

/// Degrade unknown types to a matcher that never matches
pub struct IgnoreUnknown;

impl FallbackStrategy for IgnoreUnknown {
    fn name(&self) -> &str {
        "ignore-unknown"
    }

    fn handle(
        &self,
        matcher_type: &str,
        _options: &Options,
        _context: &FallbackContext<'_>,
    ) -> Outcome<BoxedMatcher> {
        tracing::warn!("Ignoring unknown matcher type '{}'", matcher_type);
        Outcome::success(Box::new(NeverMatcher::because(format!(
            "unknown type '{}'",
            matcher_type
        ))) as BoxedMatcher)
        .with_message(Message::warning(format!(
            "Unknown matcher type '{}' ignored; the rule will never match",
            matcher_type
        )))
    }
}

/// Suggest registered types sharing the first letter
pub struct SuggestAlternatives;

impl FallbackStrategy for SuggestAlternatives {
    fn name(&self) -> &str {
        "suggest-alternatives"
    }

    fn handle(
        &self,
        matcher_type: &str,
        _options: &Options,
        context: &FallbackContext<'_>,
    ) -> Outcome<BoxedMatcher> {
        let first = matcher_type.chars().next().map(|c| c.to_ascii_lowercase());
        let candidates: Vec<&str> = context
            .available_types
            .iter()
            .filter(|t| t.chars().next().map(|c| c.to_ascii_lowercase()) == first)
            .map(String::as_str)
            .collect();

        if candidates.is_empty() {
            Outcome::warning(format!("Unknown matcher type '{}'", matcher_type))
        } else {
            Outcome::warning(format!(
                "Unknown matcher type '{}'. Similar types: {}",
                matcher_type,
                candidates.join(", ")
            ))
        }
    }
}

/// Route unknown types through the registry's [`Diagnostics`].
///
/// Not part of the default chain. Installing it in front of
/// `ignore-unknown` yields fuzzy and category suggestions together with
/// the no-op recovery matcher. Handlers and providers registered through
/// `MatcherRegistry::diagnostics_mut` apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticFallback;

impl DiagnosticFallback {
    pub fn new() -> Self {
        Self
    }
}

impl FallbackStrategy for DiagnosticFallback {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn handle(
        &self,
        matcher_type: &str,
        _options: &Options,
        context: &FallbackContext<'_>,
    ) -> Outcome<BoxedMatcher> {
        context
            .diagnostics
            .handle_unknown_type(matcher_type, context.available_types)
    }
}

/// Ordered list of fallback strategies
pub struct FallbackChain {
    strategies: Vec<Box<dyn FallbackStrategy>>,
}

impl Default for FallbackChain {
    fn default() -> Self {
        let mut chain = Self::empty();
        chain.push(Box::new(IgnoreUnknown));
        chain.push(Box::new(SuggestAlternatives));
        chain
    }
}

impl FallbackChain {
    /// Chain with no strategies
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy
    pub fn push(&mut self, strategy: Box<dyn FallbackStrategy>) {
        tracing::debug!("Added fallback strategy: {}", strategy.name());
        self.strategies.push(strategy);
    }

    /// Insert a strategy at a position (clamped to the chain length)
    pub fn insert(&mut self, index: usize, strategy: Box<dyn FallbackStrategy>) {
        tracing::debug!(
            "Inserted fallback strategy at position {}: {}",
            index,
            strategy.name()
        );
        self.strategies
            .insert(index.min(self.strategies.len()), strategy);
    }

    /// Remove all strategies
    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    /// Strategy names in order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Check for an empty chain
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Walk the chain.
    ///
    /// Returns the first outcome carrying a value, with the messages of
    /// the strategies tried before it prepended. If no strategy produces
    /// a value, the accumulated messages are returned without one.
    pub fn resolve(
        &self,
        matcher_type: &str,
        options: &Options,
        context: &FallbackContext<'_>,
    ) -> Outcome<BoxedMatcher> {
        let mut messages = Vec::new();

        for strategy in &self.strategies {
            let handled = catch_unwind(AssertUnwindSafe(|| strategy.handle(matcher_type, options, context)));
            let outcome = match handled {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    tracing::warn!("Fallback strategy '{}' panicked: {}", strategy.name(), reason);
                    context
                        .diagnostics
                        .handle_plugin_error(strategy.name(), &format!("fallback strategy panicked: {}", reason))
                }
            };
            if outcome.value.is_some() {
                tracing::debug!(
                    "Fallback strategy '{}' resolved '{}'",
                    strategy.name(),
                    matcher_type
                );
                return outcome.with_prior_messages(messages);
            }
            messages.extend(outcome.messages);
        }

        Outcome::failure(messages)
    }
}
