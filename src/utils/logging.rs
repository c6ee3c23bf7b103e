//! Logging setup for binaries and demos
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. `RUST_LOG` overrides the default filter.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Install a formatted stdout subscriber.
///
/// `default_filter` (e.g. `"geo_annotations=debug"`) is used when `RUST_LOG`
/// is unset or unparsable. Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish()
        .try_init()
}
