//! Tracing subscriber setup for the binary. Library code only emits events.

use tracing_subscriber::EnvFilter;

const LOG_FILTER_VAR: &str = "QUARTERMASTER_LOG";

/// Installs a stderr `fmt` subscriber filtered by `QUARTERMASTER_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
