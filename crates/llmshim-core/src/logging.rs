//! Logging setup.
//!
//! Instrumented calls report their own problems (undecodable bodies, unknown
//! vendors) through `tracing`; this module installs a subscriber for
//! binaries and tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize logging from the logging configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    tracing::debug!(level = %config.level, format = %config.format, "Logging initialized");
}

/// Initialize logging for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
