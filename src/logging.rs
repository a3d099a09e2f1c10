//! Diagnostic logging for the binary.
//!
//! Diagnostics go to stderr through `tracing-subscriber` so stdout stays
//! reserved for run reports. `RUST_LOG` takes precedence over the `-v`
//! count.

use std::io;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Raised when a global subscriber is already installed.
#[derive(Debug, Error)]
#[error("failed to initialise logging: {0}")]
pub struct LoggingError(String);

/// Filter directives used when `RUST_LOG` is unset.
#[must_use]
pub const fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "crrunner=warn",
        1 => "crrunner=info",
        2 => "crrunner=debug,russh=debug",
        _ => "crrunner=trace,russh=trace,russh_sftp=debug",
    }
}

/// Builds the filter from `RUST_LOG`, falling back to the verbosity default.
#[must_use]
pub fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] when a subscriber has already been set.
pub fn init(verbosity: u8) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| LoggingError(err.to_string()))
}
