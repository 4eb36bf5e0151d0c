//! Control-plane metrics.
//!
//! # Metrics
//! - `control_plane_clusters_generated` (gauge): clusters produced by the last generation cycle
//! - `control_plane_rollout_polls_total` (counter): rollout polls by outcome (unchanged, changed, error)
//! - `control_plane_bootstrap_fetch_attempts_total` (counter): object store reads, including retries
//! - `control_plane_proxy_exits_total` (counter): proxy exits by reason
//!
//! Recording is a no-op until a recorder is installed, so library users
//! and tests never need to call `init_metrics`.

use std::net::SocketAddr;

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_clusters_generated(count: usize) {
    gauge!("control_plane_clusters_generated").set(count as f64);
}

pub fn record_rollout_poll(outcome: &'static str) {
    counter!("control_plane_rollout_polls_total", "outcome" => outcome).increment(1);
}

pub fn record_bootstrap_fetch_attempt() {
    counter!("control_plane_bootstrap_fetch_attempts_total").increment(1);
}

pub fn record_proxy_exit(reason: &'static str) {
    counter!("control_plane_proxy_exits_total", "reason" => reason).increment(1);
}
