//! Process-wide tracing and diagnostics setup.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; the fallback keeps the crate at `info` and
/// everything else at `warn`. Call once at startup.
pub fn init_tracing() {
    let fmt_layer = fmt::layer().with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,coldflow=info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

/// Pretty panic reports.
pub fn init_miette() {
    miette::set_panic_hook();
}
