//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by mode, outcome, status
//! - `relay_request_duration_seconds` (histogram): time until the response head
//! - `relay_active_connections` (gauge): current connection count

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record one finished request.
///
/// `outcome` is a short fixed label such as `forwarded`, `denied` or `redirect`.
pub fn record_request(mode: &'static str, outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "relay_requests_total",
        "mode" => mode,
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "relay_request_duration_seconds",
        "mode" => mode,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("relay_active_connections").set(count as f64);
}
