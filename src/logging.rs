//! Diagnostic tracing.
//!
//! User-facing build output goes through [`crate::build::ProgressReporter`];
//! this module only wires `tracing` events (task spans, server and watcher
//! internals) to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `sitepipe=debug` when `verbose`
/// is set and `RUST_LOG` is not. Safe to call more than once; later calls are
/// ignored.
///
/// # Example
/// ```bash
/// RUST_LOG=sitepipe=debug sitepipe build
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,sitepipe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
