//! Logging setup built on `tracing`.
//!
//! The engine logs with `tracing` throughout: `trace!` for per-event
//! dispatch, `debug!` for registrations and resource state changes, `warn!`
//! for duplicate names and rejections. These helpers install a subscriber
//! with a sensible default filter; set `RUST_LOG` to override it, e.g.
//! `RUST_LOG=flowsim_core::resource=debug`.

use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at `info` level.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging at the given level (`"trace"` through `"error"`),
/// unless `RUST_LOG` overrides it.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("flowsim_core={level},flowsim_metrics={level}").into());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();

    info!("simulation logging initialized at level: {level}");
}
