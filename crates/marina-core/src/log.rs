//! Logging setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] once at
//! startup to install a subscriber. `RUST_LOG`, when set, overrides the
//! configured level.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive (`warn`, `marina_core=debug`, ...).
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Errors installing the subscriber.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogError {
    /// The filter directive did not parse.
    #[error("invalid log filter '{directive}': {source}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Builds the filter for `level`, letting `RUST_LOG` take precedence.
///
/// # Errors
///
/// Returns [`LogError::InvalidFilter`] if `level` is not a valid directive.
pub fn filter(level: &str) -> Result<EnvFilter, LogError> {
    if let Ok(env) = EnvFilter::try_from_default_env() {
        return Ok(env);
    }
    EnvFilter::try_new(level).map_err(|source| LogError::InvalidFilter {
        directive: level.to_string(),
        source,
    })
}

/// Installs a stderr formatting subscriber filtered at `level`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already
/// installed.
pub fn init(level: &str) -> Result<(), LogError> {
    tracing_subscriber::registry()
        .with(filter(level)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}
