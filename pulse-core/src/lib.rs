//! PULSE Core Library
//!
//! Client-side telemetry pipeline for an infrastructure console: a persistent
//! connection to a telemetry endpoint, per-channel update coalescing, bounded
//! time-ordered series buffers and windowed projection for rendering.

pub mod buffer;
pub mod coalescer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod observability;
pub mod projector;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export commonly used items
pub use buffer::SeriesBuffer;
pub use coalescer::{Admission, Coalescer};
pub use config::{PulseConfig, DEFAULT_ENDPOINT};
pub use coordinator::{ChannelSummary, Coordinator, FlushEvent, PipelineStats};
pub use error::{PulseError, Result};
pub use observability::init as init_observability;
pub use projector::{Viewport, Window};
pub use transport::{
    BackoffPolicy, Connection, Connector, SessionHandler, SessionOptions, SessionStats,
    TransportSession, WebSocketConnector,
};
pub use types::{
    AlertLevel, AlertRecord, AlertStatus, Channel, ChannelKind, ConnectionState, LogLevel,
    LogRecord, Payload, Sample, Timestamp,
};
