//! Log output for hosts that do not install a `tracing` subscriber.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `torii_client=debug`.
pub const LOG_ENV: &str = "TORII_LOG";

/// Installs a compact fmt subscriber filtered by `TORII_LOG`, falling back to
/// `default_filter`.
///
/// Returns `false` if a global subscriber was already set; that subscriber
/// stays in place.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
