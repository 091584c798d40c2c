//! Request counters and duration histograms over the `metrics` facade.
//!
//! The Prometheus recorder is installed lazily on first use; `/metrics`
//! renders the exposition text from the shared handle.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle to the process-wide Prometheus recorder, installing it on first
/// call.
pub fn prometheus_handle() -> &'static PrometheusHandle {
    PROMETHEUS.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install prometheus recorder")
    })
}

/// Count a served request by endpoint and status.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "strainer_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record how long an endpoint took to serve.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("strainer_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count a failed upstream fetch.
pub fn record_upstream_error() {
    counter!("strainer_upstream_errors_total").increment(1);
}

/// Count a finished resolution by outcome
/// (`filtered`, `repaired`, `unchanged`, `fallback`, `superseded`).
pub fn record_resolution(outcome: &'static str) {
    counter!("strainer_resolutions_total", "outcome" => outcome).increment(1);
}
