//! Tracing subscriber setup shared by test harnesses and benches

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
