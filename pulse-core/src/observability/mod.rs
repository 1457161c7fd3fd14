//! Observability infrastructure: tracing and metrics.
//!
//! Libraries embedding `pulse-core` may install their own subscriber and
//! recorder instead; everything here only goes through the `tracing` and
//! `metrics` facades.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber and register metric descriptions.
///
/// `default_level` applies when `RUST_LOG` is unset (e.g., "info" or
/// "pulse_core=debug"). Fails if a global subscriber is already installed.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    metrics::register_core_metrics();
    tracing::debug!("Observability initialized");

    Ok(())
}
