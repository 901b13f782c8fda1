//! Tracing subscriber bootstrap
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! [`LoggingConfig::level`]. Output is human-readable or flattened JSON.

use cadence_domain::{CadenceError, LoggingConfig, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, so calling
/// this from tests or embedded hosts is harmless.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(&config.level)?;

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .flatten_event(true)
    });
    let text_layer = (!config.json).then(|| fmt::layer().with_target(true));

    let installed =
        tracing_subscriber::registry().with(json_layer).with(text_layer).with(filter).try_init();

    match installed {
        Ok(()) => {
            tracing::info!(level = %config.level, json = config.json, "Logging initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn build_filter(default_directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| CadenceError::Config(format!("Invalid log filter '{default_directive}': {e}")))
}
