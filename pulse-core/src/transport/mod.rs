//! Telemetry transport: persistent connection, reconnect policy and the
//! connector seam.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  connect()  ┌──────────────────┐  text frames  ┌─────────────┐
//! │ TransportSession │ ──────────► │ dyn Connector    │ ◄──────────── │  endpoint   │
//! │  ├─ state        │             │  └─ Connection   │  ping / pong  │ (WebSocket) │
//! │  ├─ backoff      │ ◄────────── │     recv / send  │ ────────────► │             │
//! │  └─ handler ─────┼──► on_state_change / on_sample └──────────────┘
//! └──────────────────┘
//! ```

use crate::error::{PulseError, Result};
use async_trait::async_trait;
use url::Url;

mod backoff;
pub mod scripted;
mod session;
mod websocket;

pub use backoff::{BackoffPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use session::{
    SessionHandler, SessionOptions, SessionStats, TransportSession, DEFAULT_IDLE_TIMEOUT,
};
pub use websocket::{WebSocketConnector, DEFAULT_CONNECT_TIMEOUT};

/// Establishes connections to a telemetry endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection. Failures are retried by the session.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>>;
}

/// One live, message-delimited connection.
#[async_trait]
pub trait Connection: Send {
    /// Next text message. `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Send a text message to the peer.
    async fn send(&mut self, text: &str) -> Result<()>;
}

/// Check that `endpoint` is a `ws://` or `wss://` URL.
pub fn validate_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| PulseError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(PulseError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{scheme}', expected ws or wss"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("ws://localhost:8000/api/v1/ws/metrics").is_ok());
        assert!(validate_endpoint("wss://console.example.com/ws/logs").is_ok());
        assert!(matches!(
            validate_endpoint("http://localhost:8000"),
            Err(PulseError::InvalidEndpoint { .. })
        ));
        assert!(matches!(validate_endpoint("not a url"), Err(PulseError::InvalidEndpoint { .. })));
    }
}
