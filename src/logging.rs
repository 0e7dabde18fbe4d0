//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout stays parseable in `--format json`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "KVWARM_LOG";

/// Returns the filter for the given verbosity.
///
/// `KVWARM_LOG` wins when set and valid; otherwise `debug` with `-v` and
/// `warn` without.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "kvwarm=debug" } else { "warn" })
    })
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
