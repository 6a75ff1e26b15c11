//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

fn filter(level: &str) -> EnvFilter {
    // RUST_LOG wins over the configured level
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install a human-readable subscriber at `level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    tracing_subscriber::fmt().with_env_filter(filter(level)).try_init().is_ok()
}

/// Install a JSON subscriber at `level`, one event per line.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_json_logging(level: &str) -> bool {
    tracing_subscriber::fmt().json().with_env_filter(filter(level)).try_init().is_ok()
}
