//! Structured logging setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` overrides `filter` when set. Only the first call installs a
/// subscriber; later calls return `false` and leave it untouched.
pub fn init(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(filter).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
