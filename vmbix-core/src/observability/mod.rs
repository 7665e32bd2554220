//! Observability infrastructure: tracing and metrics.
//!
//! The daemon calls `init` once at startup. Library code only emits through
//! the `tracing` and `metrics` facades, so tests run without a subscriber or
//! recorder installed.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize logging and, when `metrics_port` is set, the Prometheus
/// scrape endpoint.
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init(log_level: &str, metrics_port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .try_init()?;

    if let Some(port) = metrics_port {
        PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port)).install()?;
        tracing::info!(port, "Prometheus metrics endpoint enabled");
    }

    metrics::register_core_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Observability initialized");
    Ok(())
}
