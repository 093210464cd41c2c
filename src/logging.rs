//! Diagnostic logging setup
//!
//! Library code only emits `tracing` events. Binaries call [`init`] once to
//! print them to stderr, filtered by `VIDRECALL_LOG` (EnvFilter syntax, e.g.
//! `VIDRECALL_LOG=vidrecall=debug`). stdout stays reserved for results.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "VIDRECALL_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install the global stderr subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
