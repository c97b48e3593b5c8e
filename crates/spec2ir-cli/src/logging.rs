//! Structured logging setup

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` when set, otherwise derived from verbosity
#[must_use]
pub fn log_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_log_filter()))
}

/// Install a compact stderr subscriber. A second call is a no-op.
pub fn init_logging(verbosity: Verbosity, use_color: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(verbosity == Verbosity::Debug)
        .compact()
        .try_init();
}
