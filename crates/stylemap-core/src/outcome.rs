//! The result envelope
//!
//! Every registry and diagnostics operation returns an [`Outcome`]: an
//! optional value plus the messages produced along the way. A `None`
//! value means the operation failed or degraded; the messages say why
//! and should be surfaced to the end user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of an outcome message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Something degraded but the conversion can continue
    Warning,
    /// The requested value could not be produced
    Error,
}

/// A message attached to an [`Outcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind
    pub kind: MessageKind,
    /// User-facing text
    pub text: String,
}

impl Message {
    /// Create a warning message
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Warning,
            text: text.into(),
        }
    }

    /// Create an error message
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }

    /// Check if this is an error message
    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Warning => write!(f, "warning"),
            MessageKind::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.text)
    }
}

/// Value-plus-messages envelope
///
/// # Example
///
/// ```
/// use stylemap_core::{Message, Outcome};
///
/// let ok = Outcome::success(42).with_message(Message::warning("rounded"));
/// assert_eq!(ok.value, Some(42));
/// assert!(ok.has_warnings());
///
/// let failed: Outcome<i32> = Outcome::error("no value");
/// assert!(failed.value.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    /// The produced value, or `None` on failure/degradation
    pub value: Option<T>,
    /// Messages produced while computing the value
    pub messages: Vec<Message>,
}

impl<T> Outcome<T> {
    /// Successful outcome without messages
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            messages: Vec::new(),
        }
    }

    /// Outcome with no value and the given messages
    pub fn failure(messages: Vec<Message>) -> Self {
        Self {
            value: None,
            messages,
        }
    }

    /// Outcome with no value and a single warning
    pub fn warning(text: impl Into<String>) -> Self {
        Self::failure(vec![Message::warning(text)])
    }

    /// Outcome with no value and a single error
    pub fn error(text: impl Into<String>) -> Self {
        Self::failure(vec![Message::error(text)])
    }

    /// Append a message
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Prepend messages produced before this outcome
    pub fn with_prior_messages(mut self, mut prior: Vec<Message>) -> Self {
        prior.append(&mut self.messages);
        self.messages = prior;
        self
    }

    /// Check whether a value was produced
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }

    /// Check for error messages
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }

    /// Check for warning messages
    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.kind == MessageKind::Warning)
    }

    /// Transform the value, keeping the messages
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            messages: self.messages,
        }
    }

    /// Split into value and messages
    pub fn into_parts(self) -> (Option<T>, Vec<Message>) {
        (self.value, self.messages)
    }
}
