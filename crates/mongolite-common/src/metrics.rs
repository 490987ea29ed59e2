//! Metrics for mongolite
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the
//! binary installs a recorder (see the Prometheus exporter in `mongolite`).

use metrics::{counter, histogram};

/// Record an inbound message by opcode name
pub fn record_request(op: &'static str) {
    counter!("mongolite_requests_total", "op" => op).increment(1);
}

/// Record documents appended to a collection
pub fn record_documents_inserted(count: u64) {
    counter!("mongolite_documents_inserted_total").increment(count);
}

/// Record documents sent back in a reply
pub fn record_documents_returned(count: u64) {
    counter!("mongolite_documents_returned_total").increment(count);
}

/// Record a dispatched administrative command
pub fn record_command(command: &str, ok: bool) {
    counter!(
        "mongolite_commands_total",
        "command" => command.to_string(),
        "ok" => if ok { "1" } else { "0" }
    )
    .increment(1);
}

/// Record an accepted connection
pub fn record_connection() {
    counter!("mongolite_connections_total").increment(1);
}

/// Record a frame rejected by the codec
pub fn record_malformed_message() {
    counter!("mongolite_malformed_messages_total").increment(1);
}

/// Record time spent routing one message
pub fn record_route_latency(op: &'static str, latency_us: f64) {
    histogram!("mongolite_route_duration_us", "op" => op).record(latency_us);
}
