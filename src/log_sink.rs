// Purpose: process-wide tracing subscriber for the filter service

use tracing_subscriber::EnvFilter;

use crate::config_loader::{LogFormat, LoggingConfig};
use crate::errors::{FilterError, FilterResult};

/// Build the env filter. `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> FilterResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            FilterError::config(format!("invalid logging.level '{}': {e}", config.level))
        }),
    }
}

/// Install the global subscriber. Calling this twice is not an error; the
/// first subscriber stays in place.
pub fn init_logging(config: &LoggingConfig) -> FilterResult<()> {
    let filter = env_filter(config)?;

    let init_result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    if let Err(e) = init_result {
        tracing::debug!("tracing subscriber already installed: {e}");
    }
    Ok(())
}
