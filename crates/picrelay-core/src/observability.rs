//! Logging bootstrap.
//!
//! The library only emits `tracing` events; binaries call [`init`] once.

use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber. `RUST_LOG` wins over `default_level`.
/// Calling it twice is harmless (the second call is ignored).
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
