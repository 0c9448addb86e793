//! Diagnostic logging to stderr
//!
//! `RUST_LOG` takes precedence. Otherwise `--verbose` turns on debug output
//! for this crate and the default shows warnings only.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let level = if verbose { "fundr=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
