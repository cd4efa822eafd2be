//! Metrics collection.
//!
//! # Metrics
//! - `near_client_rpc_calls_total` (counter): node calls by method, outcome
//! - `near_client_tx_status_total` (counter): ledger transitions by status
//! - `near_client_dispatch_path_total` (counter): local vs relay signing decisions
//! - `near_client_relay_requests_total` (counter): wallet round trips by method
//! - `near_client_subscriber_panics_total` (counter): listener failures by topic
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application installs an exporter
//! - Without an installed recorder every call is a no-op

use metrics::counter;

pub fn record_rpc_call(method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "near_client_rpc_calls_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_tx_status(status: &str) {
    counter!("near_client_tx_status_total", "status" => status.to_string()).increment(1);
}

pub fn record_dispatch_path(path: &str) {
    counter!("near_client_dispatch_path_total", "path" => path.to_string()).increment(1);
}

pub fn record_relay_request(method: &str) {
    counter!("near_client_relay_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_subscriber_panic(topic: &'static str) {
    counter!("near_client_subscriber_panics_total", "topic" => topic).increment(1);
}
