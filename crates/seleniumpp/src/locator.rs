//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a (strategy, expression) pair. The strategy is a closed
//! enum resolved at construction time, so an unknown strategy name or an empty
//! expression is rejected with [`SeleniumError::LocatorInvalid`] before any
//! driver call is made.
//!
//! Derived lookups (attribute and text helpers) are always built as XPath by
//! [`crate::xpath`]; every other strategy passes its expression through
//! untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::{SeleniumError, SeleniumResult};

/// Strategy used by the driver to interpret a locator expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Element `id` attribute
    Id,
    /// XPath 1.0 expression
    XPath,
    /// Anchor whose visible text equals the expression
    LinkText,
    /// Anchor whose visible text contains the expression
    PartialLinkText,
    /// Element `name` attribute
    Name,
    /// Element tag name
    TagName,
    /// Single CSS class name
    ClassName,
    /// CSS selector (e.g., "button.primary")
    CssSelector,
}

impl LocatorStrategy {
    /// All strategies, in declaration order
    pub const ALL: [Self; 8] = [
        Self::Id,
        Self::XPath,
        Self::LinkText,
        Self::PartialLinkText,
        Self::Name,
        Self::TagName,
        Self::ClassName,
        Self::CssSelector,
    ];

    /// WebDriver wire name for this strategy
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::XPath => "xpath",
            Self::LinkText => "link text",
            Self::PartialLinkText => "partial link text",
            Self::Name => "name",
            Self::TagName => "tag name",
            Self::ClassName => "class name",
            Self::CssSelector => "css selector",
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocatorStrategy {
    type Err = SeleniumError;

    /// Accepts the wire name (`"link text"`), the snake_case name
    /// (`"link_text"`) and the camel-case constant (`"LINK_TEXT"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .or_else(|| (normalized == "css").then_some(Self::CssSelector))
            .ok_or_else(|| SeleniumError::locator_invalid(format!("unknown strategy '{s}'")))
    }
}

/// A validated (strategy, expression) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    strategy: LocatorStrategy,
    expression: String,
}

impl Locator {
    /// Create a locator, rejecting empty or whitespace-only expressions
    pub fn new(strategy: LocatorStrategy, expression: impl Into<String>) -> SeleniumResult<Self> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(SeleniumError::locator_invalid(format!(
                "empty {strategy} expression"
            )));
        }
        Ok(Self {
            strategy,
            expression,
        })
    }

    /// Create a locator from a runtime strategy name
    ///
    /// ```
    /// use seleniumpp::{Locator, LocatorStrategy};
    ///
    /// let locator = Locator::parse("css selector", "button.primary").unwrap();
    /// assert_eq!(locator.strategy(), LocatorStrategy::CssSelector);
    /// assert!(Locator::parse("shadow", "x").is_err());
    /// ```
    pub fn parse(strategy: &str, expression: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(strategy.parse()?, expression)
    }

    /// Locate by `id`
    pub fn id(id: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::Id, id)
    }

    /// Locate by XPath
    pub fn xpath(expression: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::XPath, expression)
    }

    /// Locate by CSS selector
    pub fn css(selector: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::CssSelector, selector)
    }

    /// Locate by `name` attribute
    pub fn name(name: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::Name, name)
    }

    /// Locate by tag name
    pub fn tag_name(tag: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::TagName, tag)
    }

    /// Locate by class name
    pub fn class_name(class: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::ClassName, class)
    }

    /// Locate an anchor by its exact text
    pub fn link_text(text: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::LinkText, text)
    }

    /// Locate an anchor by a fragment of its text
    pub fn partial_link_text(text: impl Into<String>) -> SeleniumResult<Self> {
        Self::new(LocatorStrategy::PartialLinkText, text)
    }

    /// The strategy
    #[must_use]
    pub const fn strategy(&self) -> LocatorStrategy {
        self.strategy
    }

    /// The raw expression
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.expression)
    }
}

/// How text or attribute values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Whole-value equality
    Exact,
    /// Substring containment
    #[default]
    Fuzzy,
}

impl MatchMode {
    /// Map the `exact_match` flag used by script callers
    #[must_use]
    pub const fn from_exact(exact: bool) -> Self {
        if exact {
            Self::Exact
        } else {
            Self::Fuzzy
        }
    }
}

/// A [`MatchMode`] plus the case-folding flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextMatch {
    /// Exact or fuzzy comparison
    pub mode: MatchMode,
    /// Fold both sides of the comparison to lower case
    pub case_insensitive: bool,
}

impl TextMatch {
    /// Case-sensitive whole-value equality
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            mode: MatchMode::Exact,
            case_insensitive: false,
        }
    }

    /// Case-sensitive substring containment
    #[must_use]
    pub const fn fuzzy() -> Self {
        Self {
            mode: MatchMode::Fuzzy,
            case_insensitive: false,
        }
    }

    /// Set case folding
    #[must_use]
    pub const fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Whether the comparison is whole-value
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self.mode, MatchMode::Exact)
    }
}

impl From<MatchMode> for TextMatch {
    fn from(mode: MatchMode) -> Self {
        Self {
            mode,
            case_insensitive: false,
        }
    }
}
