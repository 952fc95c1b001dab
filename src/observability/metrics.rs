//! Metrics collection and exposition.
//!
//! # Metrics
//! - `keeper_blocks_total` (counter): chain-head events observed
//! - `keeper_dispatches_total` (counter): job attempts started, by job
//! - `keeper_work_requests_total` (counter): work requests received, by job
//! - `keeper_submissions_total` (counter): bundle submissions, by job and outcome
//! - `keeper_retries_total` (counter): retry iterations, by job
//! - `keeper_port_grants_total` (counter): ports handed to subprocesses

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start the scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_block() {
    metrics::counter!("keeper_blocks_total").increment(1);
}

pub fn record_dispatch(job: &str) {
    metrics::counter!("keeper_dispatches_total", "job" => job.to_string()).increment(1);
}

pub fn record_work_request(job: &str) {
    metrics::counter!("keeper_work_requests_total", "job" => job.to_string()).increment(1);
}

pub fn record_submission(job: &str, included: bool) {
    let outcome = if included { "included" } else { "missed" };
    metrics::counter!("keeper_submissions_total", "job" => job.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_retry(job: &str) {
    metrics::counter!("keeper_retries_total", "job" => job.to_string()).increment(1);
}

pub fn record_port_grant() {
    metrics::counter!("keeper_port_grants_total").increment(1);
}
