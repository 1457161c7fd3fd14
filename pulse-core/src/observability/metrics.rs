//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - plain names for gauges
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use crate::types::{Channel, ConnectionState};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Transport metrics
    describe_counter!("pulse_messages_received_total", "Total inbound telemetry messages");
    describe_counter!(
        "pulse_malformed_messages_total",
        "Total inbound messages dropped because they could not be decoded"
    );
    describe_counter!(
        "pulse_connect_failures_total",
        "Total failed connection attempts to the telemetry endpoint"
    );
    describe_counter!("pulse_disconnects_total", "Total unexpected losses of an open connection");
    describe_gauge!(
        "pulse_connection_state",
        "Connection state (0 disconnected, 1 connecting, 2 open, 3 backoff)"
    );

    // Pipeline metrics
    describe_histogram!("pulse_flush_batch_size", "Samples delivered per coalesced flush (by channel)");
    describe_counter!("pulse_evictions_total", "Samples evicted from series buffers (by channel)");
    describe_gauge!("pulse_buffer_len", "Current series buffer length (by channel)");
}

pub fn record_message_received() {
    counter!("pulse_messages_received_total").increment(1);
}

pub fn record_malformed_message() {
    counter!("pulse_malformed_messages_total").increment(1);
}

pub fn record_connect_failure() {
    counter!("pulse_connect_failures_total").increment(1);
}

pub fn record_disconnect() {
    counter!("pulse_disconnects_total").increment(1);
}

pub fn set_connection_state(state: &ConnectionState) {
    let value = match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Open => 2.0,
        ConnectionState::Backoff { .. } => 3.0,
    };
    gauge!("pulse_connection_state").set(value);
}

pub fn record_flush(channel: &Channel, batch_len: usize, evicted: usize, buffer_len: usize) {
    let name = channel.to_string();
    histogram!("pulse_flush_batch_size", "channel" => name.clone()).record(batch_len as f64);
    if evicted > 0 {
        counter!("pulse_evictions_total", "channel" => name.clone()).increment(evicted as u64);
    }
    gauge!("pulse_buffer_len", "channel" => name).set(buffer_len as f64);
}
