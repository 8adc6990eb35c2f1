//! Observability utilities for the foundry.
//!
//! Binaries call [`init_tracing`] once at startup; libraries only emit
//! `tracing` events and never install a subscriber themselves.

#![warn(missing_docs, clippy::pedantic)]

use agent_config::{LogFormat, TelemetrySettings};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive string could not be parsed.
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter {
        /// Directive string that failed.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {reason}")]
    AlreadyInstalled {
        /// Underlying error message.
        reason: String,
    },
}

/// Builds the [`EnvFilter`] described by the settings.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for malformed directives.
pub fn build_filter(settings: &TelemetrySettings) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&settings.filter).map_err(|err| TelemetryError::InvalidFilter {
        filter: settings.filter.clone(),
        reason: err.to_string(),
    })
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already active.
pub fn init_tracing(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    let filter = build_filter(settings)?;
    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = match settings.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|err| TelemetryError::AlreadyInstalled {
        reason: err.to_string(),
    })
}
