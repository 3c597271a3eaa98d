//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_body_rewrites_total` (counter): rewrite attempts by outcome
//! - `gateway_rewritten_body_bytes` (histogram): size of rewritten bodies

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";
const LABEL_ROUTE: &str = "route";
const LABEL_OUTCOME: &str = "outcome";

const METRIC_REQUESTS_TOTAL: &str = "gateway_requests_total";
const METRIC_REQUEST_DURATION: &str = "gateway_request_duration_seconds";
const METRIC_REWRITES_TOTAL: &str = "gateway_body_rewrites_total";
const METRIC_REWRITTEN_BYTES: &str = "gateway_rewritten_body_bytes";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_ROUTE => route.to_string())
        .record(start.elapsed().as_secs_f64());

    metrics::counter!(
        METRIC_REQUESTS_TOTAL,
        LABEL_METHOD => method.to_string(),
        LABEL_STATUS => status.to_string(),
        LABEL_ROUTE => route.to_string()
    )
    .increment(1);
}

/// Record one rewrite attempt; `bytes` is the final body size on success.
pub fn record_rewrite(outcome: &str, bytes: Option<u64>) {
    metrics::counter!(METRIC_REWRITES_TOTAL, LABEL_OUTCOME => outcome.to_string()).increment(1);

    if let Some(bytes) = bytes {
        metrics::histogram!(METRIC_REWRITTEN_BYTES).record(bytes as f64);
    }
}
