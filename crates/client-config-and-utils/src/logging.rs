//! Logging initialization for the client.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Initialize the logging system.
///
/// Sets up a compact tracing subscriber on stderr with the log level taken
/// from `RUST_LOG` when set, falling back to the provided default.
///
/// Call once at startup; a second call panics because a global subscriber is
/// already installed.
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error)
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("Client started");
/// ```
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!(default_level = level, "logging initialized");
}
