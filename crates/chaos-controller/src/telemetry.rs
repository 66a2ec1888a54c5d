//! Tracing subscriber setup

use crate::config::{LogConfig, LogFormat};
use crate::error::ControllerError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level.
///
/// # Errors
/// Returns `ControllerError::Config` if the filter is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ControllerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ControllerError::Config(format!("invalid log level: {e}")))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| ControllerError::Config(format!("cannot install subscriber: {e}")))
}
