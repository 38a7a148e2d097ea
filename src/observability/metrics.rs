//! Lifecycle metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_shutdown_triggers_total` (counter): winning trigger by source
//! - `lifecycle_cleanup_actions_total` (counter): actions run, by phase
//! - `lifecycle_stop_failures_total` (counter): failed or timed-out stops
//! - `lifecycle_shutdown_duration_seconds` (histogram): trigger to done
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Count the trigger that won the shutdown gate.
pub fn record_trigger(source: &'static str) {
    ::metrics::counter!("lifecycle_shutdown_triggers_total", "source" => source).increment(1);
}

/// Count cleanup actions run during one drain of `phase`.
pub fn record_cleanup(phase: &'static str, count: usize) {
    ::metrics::counter!("lifecycle_cleanup_actions_total", "phase" => phase)
        .increment(count as u64);
}

pub fn record_stop_failure() {
    ::metrics::counter!("lifecycle_stop_failures_total").increment(1);
}

pub fn record_shutdown_duration(started: Instant) {
    ::metrics::histogram!("lifecycle_shutdown_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}
