//! Tracing subscriber setup

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Install the global subscriber; `RUST_LOG` takes precedence over the config
///
/// # Errors
/// Returns error if the level is not a valid filter or a subscriber is
/// already installed
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    }
    .map_err(|e| eyre::eyre!("failed to install tracing subscriber: {e}"))
}
