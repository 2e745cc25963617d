//! Tracing subscriber setup.
//!
//! Stdout carries the plugin protocol, so log lines always go to stderr.

use std::env;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, for example `debug` or
/// `terraform_provider_fluence=trace`.
pub const LOG_ENV: &str = "FLUENCE_LOG";

const DEFAULT_FILTER: &str = "info";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Errors raised while installing the subscriber.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// The global subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Install(String),
}

/// Returns the filter directive to use for a raw `FLUENCE_LOG` value.
#[must_use]
pub fn filter_directive(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_owned()
}

/// Installs the global subscriber. Later calls are no-ops.
///
/// # Errors
///
/// Returns [`LoggingError::Install`] when another subscriber is already set.
pub fn init_logging() -> Result<(), LoggingError> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let directive = filter_directive(env::var(LOG_ENV).ok().as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))?;
    LOGGING_INIT.set(()).ok();

    tracing::debug!(filter = directive.as_str(), "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "info")]
    #[case(Some(""), "info")]
    #[case(Some("  "), "info")]
    #[case(Some("debug"), "debug")]
    #[case(Some(" terraform_provider_fluence=trace "), "terraform_provider_fluence=trace")]
    fn filter_directive_defaults_to_info(#[case] raw: Option<&str>, #[case] expected: &str) {
        assert_eq!(filter_directive(raw), expected);
    }
}
