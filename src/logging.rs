//! Tracing subscriber initialisation for structured diagnostics.
//!
//! User-facing progress output goes through [`crate::progress`]; this module
//! only wires the `tracing` macros used across the crate to stderr, filtered
//! by `RUST_LOG` or the `--verbose` flag.
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `--verbose` selects `debug` and
/// the default is `info`. Repeated initialisation (tests) is ignored.
pub fn init_subscriber(verbose: bool, command: &str) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();

    tracing::debug!(command, "logging initialised");
}
