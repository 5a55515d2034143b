//! Diagnostic logging for the daemon.
//!
//! Controlled by `RUST_LOG`, written to stderr. This is operator output only;
//! the product artifacts are the response files under `.drover/responses/`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. Defaults to `info` when `RUST_LOG` is
/// unset. Call once, from the binary entrypoint.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
