//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_rpc_fanout_total` (counter): cluster calls by `op`
//! - `proxy_rpc_absent_replies_total` (counter): absent replies by `op`
//! - `proxy_rpc_notifications_total` (counter): fire-and-forget calls by `op`
//! - `proxy_rpc_peer_failures_total` (counter): transport failures by `op`
//! - `proxy_discovery_events_total` (counter): journaled intents by `kind`
//! - `proxy_journal_evictions_total` (counter): events dropped at capacity
//! - `proxy_resets_total` (counter): reset cycle phases by `phase`
//! - `proxy_status_cycle_duration_seconds` (histogram)
//! - `proxy_health` (gauge): 1=OK, 0=otherwise, by `proxy`
//! - `proxy_is_master` (gauge): 1 while this node holds mastership

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fanout(op: &'static str, members: usize, absent: usize) {
    counter!("proxy_rpc_fanout_total", "op" => op).increment(1);
    if absent > 0 {
        counter!("proxy_rpc_absent_replies_total", "op" => op).increment(absent as u64);
    }
    histogram!("proxy_rpc_fanout_members", "op" => op).record(members as f64);
}

pub fn record_notification(op: &'static str) {
    counter!("proxy_rpc_notifications_total", "op" => op).increment(1);
}

pub fn record_peer_failure(op: &'static str) {
    counter!("proxy_rpc_peer_failures_total", "op" => op).increment(1);
}

pub fn record_proxy_health(proxy: &str, ok: bool) {
    gauge!("proxy_health", "proxy" => proxy.to_string()).set(if ok { 1.0 } else { 0.0 });
}

/// `kind` is `add` or `remove`.
pub fn record_discovery_event(kind: &'static str) {
    counter!("proxy_discovery_events_total", "kind" => kind).increment(1);
}

pub fn record_journal_eviction() {
    counter!("proxy_journal_evictions_total").increment(1);
}

/// `phase` is `initiated` or `completed`.
pub fn record_reset(phase: &'static str) {
    counter!("proxy_resets_total", "phase" => phase).increment(1);
}

pub fn record_status_cycle(elapsed: Duration) {
    histogram!("proxy_status_cycle_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_master(is_master: bool) {
    gauge!("proxy_is_master").set(if is_master { 1.0 } else { 0.0 });
}
