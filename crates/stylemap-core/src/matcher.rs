//! The matcher capability
//!
//! A [`Matcher`] is a compiled style rule: a pure predicate over a
//! document [`Element`]. Matchers never mutate the element and never
//! panic for well-formed input; wrappers around user code catch failures
//! and degrade to `false` (or to a fallback matcher).

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use stylemap_ast::Element;

use crate::error::PredicateError;

/// A compiled style rule
///
/// # Thread Safety
///
/// Matchers must be `Send + Sync`: once setup is complete, matching can
/// be spread across workers.
pub trait Matcher: Send + Sync {
    /// Check whether the element satisfies this rule
    fn matches(&self, element: &Element) -> bool;

    /// Short human-readable description
    fn describe(&self) -> String {
        "matcher".to_string()
    }
}

/// Owned, type-erased matcher
pub type BoxedMatcher = Box<dyn Matcher>;

/// User predicate that may fail
pub type Predicate = Box<dyn Fn(&Element) -> Result<bool, PredicateError> + Send + Sync>;

impl fmt::Debug for dyn Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({})", self.describe())
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn matches(&self, element: &Element) -> bool {
        (**self).matches(element)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<M: Matcher + ?Sized> Matcher for Arc<M> {
    fn matches(&self, element: &Element) -> bool {
        (**self).matches(element)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Matcher that never matches
///
/// Used as the recovery value for unknown types and as the stand-in for
/// unbound transform backends.
#[derive(Debug, Clone, Default)]
pub struct NeverMatcher {
    reason: Option<String>,
}

impl NeverMatcher {
    /// Create a no-op matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a no-op matcher that records why it exists
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Boxed no-op matcher
    pub fn boxed() -> BoxedMatcher {
        Box::new(Self::new())
    }
}

impl Matcher for NeverMatcher {
    fn matches(&self, _element: &Element) -> bool {
        false
    }

    fn describe(&self) -> String {
        match self.reason {
            Some(ref reason) => format!("never ({})", reason),
            None => "never".to_string(),
        }
    }
}

/// Matcher backed by an infallible closure
pub struct FnMatcher<F> {
    name: String,
    predicate: F,
}

impl<F> FnMatcher<F>
where
    F: Fn(&Element) -> bool + Send + Sync,
{
    /// Wrap a closure under a descriptive name
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&Element) -> bool + Send + Sync,
{
    fn matches(&self, element: &Element) -> bool {
        (self.predicate)(element)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Box a closure as a matcher
pub fn matcher_fn<F>(name: impl Into<String>, predicate: F) -> BoxedMatcher
where
    F: Fn(&Element) -> bool + Send + Sync + 'static,
{
    Box::new(FnMatcher::new(name, predicate))
}

/// Run a fallible predicate, turning panics into [`PredicateError::Panicked`]
pub fn guarded<F>(predicate: F, element: &Element) -> Result<bool, PredicateError>
where
    F: Fn(&Element) -> Result<bool, PredicateError>,
{
    match catch_unwind(AssertUnwindSafe(|| predicate(element))) {
        Ok(result) => result,
        Err(payload) => Err(PredicateError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Predicate-with-fallback combinator
///
/// Evaluates a user predicate; when it returns `false` or fails, the
/// optional fallback matcher decides instead. Without a fallback, failure
/// means no match. This is the building block for higher-order matchers.
///
/// # Example
///
/// ```
/// use stylemap_ast::Element;
/// use stylemap_core::{ConditionalMatcher, Matcher, PredicateError};
/// use stylemap_core::matcher::matcher_fn;
///
/// let matcher = ConditionalMatcher::new(|_el: &Element| {
///     Err(PredicateError::Failed("no data".into()))
/// })
/// .with_fallback(matcher_fn("always", |_| true));
///
/// assert!(matcher.matches(&Element::paragraph()));
/// ```
pub struct ConditionalMatcher {
    condition: Predicate,
    fallback: Option<BoxedMatcher>,
}

impl ConditionalMatcher {
    /// Wrap a fallible predicate
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&Element) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            condition: Box::new(condition),
            fallback: None,
        }
    }

    /// Delegate to this matcher when the condition is false or fails
    pub fn with_fallback(mut self, fallback: BoxedMatcher) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn fall_back(&self, element: &Element) -> bool {
        self.fallback
            .as_ref()
            .map_or(false, |fallback| fallback.matches(element))
    }
}

impl Matcher for ConditionalMatcher {
    fn matches(&self, element: &Element) -> bool {
        match guarded(&self.condition, element) {
            Ok(true) => true,
            Ok(false) => self.fall_back(element),
            Err(e) => {
                tracing::debug!("Condition failed, using fallback: {}", e);
                self.fall_back(element)
            }
        }
    }

    fn describe(&self) -> String {
        match self.fallback {
            Some(ref fallback) => format!("conditional (else {})", fallback.describe()),
            None => "conditional".to_string(),
        }
    }
}
