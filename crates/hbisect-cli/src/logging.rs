//! Diagnostic logging setup.
//!
//! All protocol output (trigger lines, `Trying:` narrative, the final
//! report) goes to stdout untouched; tracing diagnostics go to stderr
//! so they never pollute what external tools parse.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default
/// filter; `-v` lowers it to `debug`.
///
/// Uses `try_init` so repeated calls (tests drive the entrypoint more
/// than once per process) keep the first subscriber instead of
/// panicking.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}
