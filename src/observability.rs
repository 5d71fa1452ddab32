//! Tracing subscriber setup

use crate::config::AppConfig;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global `fmt` subscriber. `RUST_LOG` takes precedence over the
/// configured level. Returns false when a subscriber was already installed.
pub fn init_tracing(config: &AppConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match fmt().with_env_filter(filter).try_init() {
        Ok(()) => {
            tracing::debug!(environment = %config.environment, "tracing initialised");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "tracing init failed");
            false
        }
    }
}
