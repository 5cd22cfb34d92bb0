//! Tracing subscriber setup for embedders and test binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence; `default_level` applies to this crate's
/// target otherwise. Safe to call once per process; embedders with their
/// own subscriber should skip this and route the `tracing` events
/// themselves.
pub fn init_logging(default_level: &str) {
    let fallback = format!("direct_transfer={default_level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
