//! Log output setup.
//!
//! The engine only emits `tracing` events; nothing is printed unless the
//! embedding program installs a subscriber. [`init`] installs a plain `fmt`
//! subscriber for programs that have none of their own.

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::result::{SeleniumError, SeleniumResult};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line events
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Parse `EnvFilter` directives, mapping failures to [`SeleniumError::Config`]
pub fn parse_filter(directives: &str) -> SeleniumResult<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|err| SeleniumError::config(format!("invalid log filter {directives:?}: {err}")))
}

/// `RUST_LOG` if set and valid, otherwise `fallback`
pub fn filter_from_env(fallback: &str) -> SeleniumResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_filter(fallback),
    }
}

/// Install a global subscriber filtered by `RUST_LOG` or the config's filter.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case nothing changes.
pub fn init(config: &EngineConfig) -> SeleniumResult<bool> {
    init_with(&config.log_filter, LogFormat::Text)
}

/// Install a global subscriber with an explicit fallback filter and format
pub fn init_with(fallback: &str, format: LogFormat) -> SeleniumResult<bool> {
    let filter = filter_from_env(fallback)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false);
    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    Ok(installed)
}
