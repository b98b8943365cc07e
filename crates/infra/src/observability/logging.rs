//! `tracing` subscriber installation
//!
//! `RUST_LOG` wins over the configured level so a field device can be
//! switched to debug output without touching the config file.

use shiftsync_domain::{LoggingConfig, Result, ShiftSyncError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber described by `config`
///
/// # Errors
/// Returns `ShiftSyncError::Config` when the level directive is invalid or a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| ShiftSyncError::Config(format!("Failed to install subscriber: {e}")))?;
    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}

/// Filter from `RUST_LOG`, or from the configured level when unset
///
/// # Errors
/// Returns `ShiftSyncError::Config` when the configured directive does not
/// parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ShiftSyncError::Config(format!("Invalid log level '{}': {e}", config.level)))
}
