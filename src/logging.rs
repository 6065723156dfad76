//! Diagnostic tracing for swarm runs.
//!
//! Reads `RUST_LOG`, defaults to `warn`, writes compact output to stderr.
//! The durable record of a run is the coordination store and the JSON run
//! report, not this stream.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
