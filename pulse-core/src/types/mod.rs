//! Core domain types for PULSE.

pub mod channel;
pub mod connection;
pub mod sample;

// Re-exports
pub use channel::{Channel, ChannelKind, ALERT_CHANNEL, LOG_CHANNEL, METRIC_PREFIX};
pub use connection::ConnectionState;
pub use sample::{
    AlertLevel, AlertRecord, AlertStatus, LogLevel, LogRecord, Payload, Sample, Timestamp,
};
