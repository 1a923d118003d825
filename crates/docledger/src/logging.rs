use crate::Error;
use docledger_core::{
    config::LoggingConfig,
    error::{ErrorClass, ErrorOrigin},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter: `RUST_LOG` wins over the configured directive.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter, Error> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.filter).map_err(|err| {
        Error::new(
            ErrorClass::InvalidArgument,
            ErrorOrigin::Config,
            format!("logging.filter '{}': {err}", config.filter),
        )
    })
}

/// Install the global `tracing` subscriber.
///
/// Returns `false` when a subscriber was already installed; that one stays.
pub fn init(config: &LoggingConfig) -> Result<bool, Error> {
    let installed = tracing_subscriber::registry()
        .with(filter(config)?)
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.filter, "logging initialized");
    }

    Ok(installed)
}
