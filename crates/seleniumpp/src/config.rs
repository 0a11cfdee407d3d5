//! Engine configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```yaml
//! timeout_ms: 5000
//! case_insensitive: true
//! frame_fallback: false
//! log_filter: seleniumpp=debug
//! ```

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use std::path::Path;

use crate::interaction::{RetryPolicy, DEFAULT_CLICK_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use crate::locator::{MatchMode, TextMatch};
use crate::resolver::{ResolverOptions, DEFAULT_FRAME_TIMEOUT_MS};
use crate::result::{SeleniumError, SeleniumResult};
use crate::wait::{PredicateKind, WaitSpec, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use crate::xpath::ButtonUnion;

/// Default format for date inputs
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default format for `datetime-local` inputs
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Settings shared by every lookup and action of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wait budget for each lookup
    pub timeout_ms: u64,
    /// Pause between polls
    pub poll_interval_ms: u64,
    /// Fold case in text and attribute comparisons
    pub case_insensitive: bool,
    /// Search iframes when the top document has no match
    pub frame_fallback: bool,
    /// Wait budget inside each frame during fallback
    pub frame_timeout_ms: u64,
    /// Click attempts, including the first
    pub click_retries: u32,
    /// Pause between click attempts
    pub retry_delay_ms: u64,
    /// Accept `span`/`div`/`a` with `role='button'` as buttons
    pub role_buttons: bool,
    /// Accept `input[type=button|submit]` as buttons
    pub input_buttons: bool,
    /// Fail single-element lookups that match more than one node
    pub strict: bool,
    /// Hover over each element before acting on it
    pub move_to_element: bool,
    /// `strftime` format for date inputs
    pub date_format: String,
    /// `strftime` format for datetime inputs
    pub datetime_format: String,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            case_insensitive: false,
            frame_fallback: true,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            click_retries: DEFAULT_CLICK_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            role_buttons: true,
            input_buttons: true,
            strict: false,
            move_to_element: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    // ===== LOADING =====

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> SeleniumResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SeleniumResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|err| {
            SeleniumError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> SeleniumResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> SeleniumResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check that every field is usable
    pub fn validate(&self) -> SeleniumResult<()> {
        self.wait_spec(PredicateKind::PresenceOf)
            .validate()
            .map_err(|err| SeleniumError::config(err.to_string()))?;
        if self.frame_fallback && self.frame_timeout_ms == 0 {
            return Err(SeleniumError::config(
                "frame_timeout_ms must be positive when frame_fallback is on",
            ));
        }
        if self.click_retries == 0 {
            return Err(SeleniumError::config("click_retries must be at least 1"));
        }
        check_format("date_format", &self.date_format)?;
        check_format("datetime_format", &self.datetime_format)?;
        self.format_date(NaiveDate::default())?;
        self.format_datetime(NaiveDateTime::default())?;
        crate::logging::parse_filter(&self.log_filter)?;
        Ok(())
    }

    // ===== BUILDERS =====

    /// Set the lookup timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set case folding
    #[must_use]
    pub const fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Enable or disable frame fallback
    #[must_use]
    pub const fn with_frame_fallback(mut self, frame_fallback: bool) -> Self {
        self.frame_fallback = frame_fallback;
        self
    }

    /// Set the per-frame timeout
    #[must_use]
    pub const fn with_frame_timeout(mut self, frame_timeout_ms: u64) -> Self {
        self.frame_timeout_ms = frame_timeout_ms;
        self
    }

    /// Set click attempts and the pause between them
    #[must_use]
    pub const fn with_click_retries(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.click_retries = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Choose which button-like elements label lookups accept
    #[must_use]
    pub const fn with_button_union(mut self, union: ButtonUnion) -> Self {
        self.role_buttons = union.role_containers;
        self.input_buttons = union.input_buttons;
        self
    }

    /// Enable or disable strict mode
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable hovering before actions
    #[must_use]
    pub const fn with_move_to_element(mut self, move_to_element: bool) -> Self {
        self.move_to_element = move_to_element;
        self
    }

    /// Set the date and datetime formats
    #[must_use]
    pub fn with_date_formats(
        mut self,
        date_format: impl Into<String>,
        datetime_format: impl Into<String>,
    ) -> Self {
        self.date_format = date_format.into();
        self.datetime_format = datetime_format.into();
        self
    }

    /// Set the fallback log filter
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    // ===== FORMATTING =====

    /// Render `date` with `date_format`.
    ///
    /// Fails when the format asks for fields a date does not have, such as `%H`.
    pub fn format_date(&self, date: NaiveDate) -> SeleniumResult<String> {
        render("date_format", &self.date_format, date.format(&self.date_format))
    }

    /// Render `datetime` with `datetime_format`
    pub fn format_datetime(&self, datetime: NaiveDateTime) -> SeleniumResult<String> {
        render(
            "datetime_format",
            &self.datetime_format,
            datetime.format(&self.datetime_format),
        )
    }

    // ===== DERIVED SETTINGS =====

    /// Wait spec for `predicate` using the configured timing
    #[must_use]
    pub fn wait_spec(&self, predicate: PredicateKind) -> WaitSpec {
        WaitSpec::new(predicate)
            .with_timeout(self.timeout_ms)
            .with_poll_interval(self.poll_interval_ms)
    }

    /// Click retry policy
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.click_retries).with_delay_ms(self.retry_delay_ms)
    }

    /// Resolver switches
    #[must_use]
    pub const fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            frame_fallback: self.frame_fallback,
            frame_timeout_ms: self.frame_timeout_ms,
            strict: self.strict,
        }
    }

    /// Branches unioned into label lookups
    #[must_use]
    pub const fn button_union(&self) -> ButtonUnion {
        ButtonUnion {
            role_containers: self.role_buttons,
            input_buttons: self.input_buttons,
        }
    }

    /// Text comparison for the `exact` flag with the configured case folding
    #[must_use]
    pub const fn text_match(&self, exact: bool) -> TextMatch {
        TextMatch {
            mode: MatchMode::from_exact(exact),
            case_insensitive: self.case_insensitive,
        }
    }
}

fn check_format(field: &str, format: &str) -> SeleniumResult<()> {
    if format.trim().is_empty() {
        return Err(SeleniumError::config(format!("{field} must not be empty")));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(SeleniumError::config(format!(
            "{field} is not a valid strftime format: {format}"
        )));
    }
    Ok(())
}

fn render(field: &str, format: &str, formatted: impl Display) -> SeleniumResult<String> {
    let mut out = String::new();
    write!(out, "{formatted}").map_err(|_| {
        SeleniumError::config(format!("{field} {format:?} cannot be rendered for this value"))
    })?;
    Ok(out)
}
