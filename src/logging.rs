//! Diagnostic output shared by both binaries.
//!
//! Everything goes to stderr so stdout stays clean for `--output-env`
//! redirection. `RUST_LOG` takes precedence over the verbosity flag.

use std::io::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug,hyper=info,hyper_util=info,reqwest=info"
    } else {
        "info"
    }
}

/// Level prefixes (`INFO`, `WARN`) are only shown with `-v`; normal runs
/// print bare progress lines.
pub fn show_level(verbose: bool) -> bool {
    verbose
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .with_level(show_level(verbose))
                .without_time(),
        )
        .try_init();
}
