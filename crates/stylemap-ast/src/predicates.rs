//! Canonical element predicates
//!
//! One predicate per built-in element kind. The matcher registry wraps
//! these, so their behaviour defines what `paragraph`, `page-break`,
//! `bold` and friends mean.
//!
//! Style names compare case-insensitively; style IDs compare exactly.

use serde_json::Value;

use crate::element::Element;
use crate::options::{Options, OptionsExt};

/// How a style name is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleNameMatch {
    /// Case-insensitive equality
    EqualTo(String),
    /// Case-insensitive prefix
    StartsWith(String),
}

impl StyleNameMatch {
    /// Check a style name against this pattern
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        match self {
            StyleNameMatch::EqualTo(expected) => name == *expected,
            StyleNameMatch::StartsWith(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Optional style constraints shared by paragraph, run and table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleFilter {
    /// Exact style ID
    pub style_id: Option<String>,
    /// Style name pattern
    pub style_name: Option<StyleNameMatch>,
}

impl StyleFilter {
    /// Build a filter from `styleId`, `styleName` and `styleNamePrefix` options.
    ///
    /// `styleName` wins over `styleNamePrefix` when both are given.
    pub fn from_options(options: &Options) -> Self {
        let style_name = options
            .str_opt("styleName")
            .map(|name| StyleNameMatch::EqualTo(name.to_lowercase()))
            .or_else(|| {
                options
                    .str_opt("styleNamePrefix")
                    .map(|prefix| StyleNameMatch::StartsWith(prefix.to_lowercase()))
            });

        Self {
            style_id: options.str_opt("styleId").map(str::to_string),
            style_name,
        }
    }

    /// Require an exact style ID
    pub fn with_style_id(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    /// Require a style name (case-insensitive)
    pub fn with_style_name(mut self, style_name: &str) -> Self {
        self.style_name = Some(StyleNameMatch::EqualTo(style_name.to_lowercase()));
        self
    }

    /// Check whether the filter has no constraints
    pub fn is_empty(&self) -> bool {
        self.style_id.is_none() && self.style_name.is_none()
    }

    /// Check an element's style against this filter
    pub fn matches(&self, element: &Element) -> bool {
        if let Some(ref expected) = self.style_id {
            if element.style_id.as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        if let Some(ref pattern) = self.style_name {
            match element.style_name.as_deref() {
                Some(name) if pattern.matches(name) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Paragraph with matching style
pub fn is_paragraph(element: &Element, filter: &StyleFilter) -> bool {
    element.is("paragraph") && filter.matches(element)
}

/// Run with matching style
pub fn is_run(element: &Element, filter: &StyleFilter) -> bool {
    element.is("run") && filter.matches(element)
}

/// Table with matching style
pub fn is_table(element: &Element, filter: &StyleFilter) -> bool {
    element.is("table") && filter.matches(element)
}

/// Built-in break kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakKind {
    /// Soft line break
    Line,
    /// Page break
    Page,
    /// Column break
    Column,
}

impl BreakKind {
    /// All built-in break kinds
    pub fn all() -> &'static [BreakKind] {
        &[BreakKind::Line, BreakKind::Page, BreakKind::Column]
    }

    /// Value of the `breakType` field for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            BreakKind::Line => "line",
            BreakKind::Page => "page",
            BreakKind::Column => "column",
        }
    }

    /// Registered matcher type name
    pub fn type_name(self) -> &'static str {
        match self {
            BreakKind::Line => "line-break",
            BreakKind::Page => "page-break",
            BreakKind::Column => "column-break",
        }
    }
}

/// Break element of the given kind
pub fn is_break(element: &Element, kind: BreakKind) -> bool {
    element.is("break") && element.field_str("breakType") == Some(kind.as_str())
}

/// Built-in formatting kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formatting {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    AllCaps,
    SmallCaps,
    Highlight,
    CommentReference,
}

impl Formatting {
    /// All built-in formatting kinds
    pub fn all() -> &'static [Formatting] {
        &[
            Formatting::Bold,
            Formatting::Italic,
            Formatting::Underline,
            Formatting::Strikethrough,
            Formatting::AllCaps,
            Formatting::SmallCaps,
            Formatting::Highlight,
            Formatting::CommentReference,
        ]
    }

    /// Registered matcher type name
    pub fn type_name(self) -> &'static str {
        match self {
            Formatting::Bold => "bold",
            Formatting::Italic => "italic",
            Formatting::Underline => "underline",
            Formatting::Strikethrough => "strikethrough",
            Formatting::AllCaps => "all-caps",
            Formatting::SmallCaps => "small-caps",
            Formatting::Highlight => "highlight",
            Formatting::CommentReference => "comment-reference",
        }
    }

    /// Run field carrying the flag, for flag-style formatting
    fn run_flag(self) -> Option<&'static str> {
        match self {
            Formatting::Bold => Some("isBold"),
            Formatting::Italic => Some("isItalic"),
            Formatting::Underline => Some("isUnderline"),
            Formatting::Strikethrough => Some("isStrikethrough"),
            Formatting::AllCaps => Some("isAllCaps"),
            Formatting::SmallCaps => Some("isSmallCaps"),
            Formatting::Highlight | Formatting::CommentReference => None,
        }
    }
}

/// Element carrying the given formatting
pub fn has_formatting(element: &Element, formatting: Formatting) -> bool {
    match formatting {
        Formatting::Highlight => is_highlight(element, None),
        Formatting::CommentReference => element.is("commentReference"),
        flag => match flag.run_flag() {
            Some(field) => element.is("run") && element.flag(field),
            None => false,
        },
    }
}

/// Highlighted run, optionally of a specific colour (case-insensitive)
pub fn is_highlight(element: &Element, color: Option<&str>) -> bool {
    if !element.is("run") {
        return false;
    }
    match element.field("highlight") {
        Some(Value::String(actual)) if !actual.is_empty() && actual != "none" => {
            color.map_or(true, |c| actual.eq_ignore_ascii_case(c))
        }
        _ => false,
    }
}
