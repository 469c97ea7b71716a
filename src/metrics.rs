//! Performance metrics collection for the query engine
//!
//! This module provides functionality for collecting and exposing performance metrics
//! in Prometheus format.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the metrics collection system
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    // Create a Prometheus exporter
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Record a completed panel query
pub fn record_query(duration_ms: f64) {
    counter!("onms.query.count").increment(1);
    histogram!("onms.query.duration_ms").record(duration_ms);
}

/// Record a panel query answered without contacting the server
pub fn record_empty_query() {
    counter!("onms.query.empty").increment(1);
}

/// Record a target dropped for missing required fields
pub fn record_skipped_target(kind: &'static str) {
    counter!("onms.query.skipped_targets", "kind" => kind).increment(1);
}

/// Record a request retried after a connection failure
pub fn record_request_retry() {
    counter!("onms.request.retries").increment(1);
}

/// Record a request rejected by the server
pub fn record_request_failure(status: u16) {
    counter!("onms.request.failures", "status" => status.to_string()).increment(1);
}

/// Record the size of a parsed response
pub fn record_series(series: usize, points: usize) {
    histogram!("onms.response.series").record(series as f64);
    counter!("onms.response.points").increment(points as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        // no recorder is installed in unit tests
        record_query(15.5);
        record_empty_query();
        record_skipped_target("attribute");
        record_request_retry();
        record_request_failure(404);
        record_series(2, 10);
    }
}
