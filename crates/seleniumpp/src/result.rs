//! Result and error types for Seleniumpp.
//!
//! Every failure the engine can surface is one variant of [`SeleniumError`].
//! Variants carry the locator, strategy, scope and elapsed time needed to log
//! and diagnose the failure without re-running it.

use std::fmt;
use thiserror::Error;

use crate::wait::PredicateKind;

/// Result type for Seleniumpp operations
pub type SeleniumResult<T> = Result<T, SeleniumError>;

/// Errors that can occur while resolving or interacting with elements
#[derive(Debug, Clone, Error)]
pub enum SeleniumError {
    /// Malformed strategy or expression, raised before any wait begins
    #[error("Invalid locator: {message}")]
    LocatorInvalid {
        /// Error message
        message: String,
    },

    /// Malformed wait settings
    #[error("Invalid wait: {message}")]
    InvalidWait {
        /// Error message
        message: String,
    },

    /// Predicate never satisfied within the wait budget
    #[error("Timed out after {elapsed_ms}ms (limit {timeout_ms}ms) waiting for {predicate} of {target} in {scope}")]
    Timeout {
        /// Locator or page text that was waited on
        target: String,
        /// Which predicate was polled
        predicate: PredicateKind,
        /// Frame scope the wait ran in
        scope: String,
        /// Configured timeout
        timeout_ms: u64,
        /// Time actually spent
        elapsed_ms: u64,
    },

    /// Every fallback scope was exhausted
    #[error("Element not found: {locator} (searched {scopes_searched} scope(s) in {elapsed_ms}ms)")]
    ElementNotFound {
        /// Locator that was resolved
        locator: String,
        /// Number of scopes (default content plus frames) searched
        scopes_searched: usize,
        /// Total resolution time
        elapsed_ms: u64,
    },

    /// Node resolved but not displayed or not enabled at action time
    #[error("Element {element} is not interactable: {reason}")]
    ElementNotInteractable {
        /// Element id
        element: String,
        /// Why the element cannot be acted on
        reason: String,
    },

    /// Node detached between resolution and action
    #[error("Stale element reference: {element}")]
    StaleElement {
        /// Element id
        element: String,
    },

    /// Strict mode found more than one candidate for a single-element lookup
    #[error("Ambiguous match: {locator} matched {count} elements")]
    AmbiguousMatch {
        /// Locator that was resolved
        locator: String,
        /// Number of matches
        count: usize,
    },

    /// A select element has no option with the requested text or value
    #[error("Select {element} has no option {option}")]
    OptionNotFound {
        /// Select element id
        element: String,
        /// Requested option text or value
        option: String,
    },

    /// Any other failure reported by the browser driver
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

/// Coarse classification of [`SeleniumError`], used by retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// See [`SeleniumError::LocatorInvalid`]
    LocatorInvalid,
    /// See [`SeleniumError::InvalidWait`]
    InvalidWait,
    /// See [`SeleniumError::Timeout`]
    Timeout,
    /// See [`SeleniumError::ElementNotFound`]
    ElementNotFound,
    /// See [`SeleniumError::ElementNotInteractable`]
    ElementNotInteractable,
    /// See [`SeleniumError::StaleElement`]
    StaleElement,
    /// See [`SeleniumError::AmbiguousMatch`]
    AmbiguousMatch,
    /// See [`SeleniumError::OptionNotFound`]
    OptionNotFound,
    /// See [`SeleniumError::Driver`]
    Driver,
    /// See [`SeleniumError::Config`]
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocatorInvalid => "locator-invalid",
            Self::InvalidWait => "invalid-wait",
            Self::Timeout => "timeout",
            Self::ElementNotFound => "element-not-found",
            Self::ElementNotInteractable => "element-not-interactable",
            Self::StaleElement => "stale-element",
            Self::AmbiguousMatch => "ambiguous-match",
            Self::OptionNotFound => "option-not-found",
            Self::Driver => "driver",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

impl SeleniumError {
    /// Build a [`SeleniumError::LocatorInvalid`]
    pub fn locator_invalid(message: impl Into<String>) -> Self {
        Self::LocatorInvalid {
            message: message.into(),
        }
    }

    /// Build a [`SeleniumError::InvalidWait`]
    pub fn invalid_wait(message: impl Into<String>) -> Self {
        Self::InvalidWait {
            message: message.into(),
        }
    }

    /// Build a [`SeleniumError::StaleElement`]
    pub fn stale(element: impl Into<String>) -> Self {
        Self::StaleElement {
            element: element.into(),
        }
    }

    /// Build a [`SeleniumError::ElementNotInteractable`]
    pub fn not_interactable(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ElementNotInteractable {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`SeleniumError::Driver`]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Build a [`SeleniumError::Config`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LocatorInvalid { .. } => ErrorKind::LocatorInvalid,
            Self::InvalidWait { .. } => ErrorKind::InvalidWait,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Self::ElementNotInteractable { .. } => ErrorKind::ElementNotInteractable,
            Self::StaleElement { .. } => ErrorKind::StaleElement,
            Self::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            Self::OptionNotFound { .. } => ErrorKind::OptionNotFound,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Document-timing failures that a later poll may not see again.
    ///
    /// The wait loop treats these as "not yet satisfied" instead of aborting.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement { .. } | Self::ElementNotInteractable { .. }
        )
    }
}

impl From<serde_yaml_ng::Error> for SeleniumError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<serde_json::Error> for SeleniumError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<std::io::Error> for SeleniumError {
    fn from(err: std::io::Error) -> Self {
        Self::config(err.to_string())
    }
}
