//! Logging setup
//!
//! The library never installs a global subscriber. Binaries call [`init`] once
//! at startup and hand a span from [`registry_span`] to the engine.

use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber. `RUST_LOG` wins over `default_level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Root span for one registry instance; engine operations log beneath it.
pub fn registry_span(instance: &str) -> Span {
    tracing::info_span!("worker_registry", instance = %instance)
}
