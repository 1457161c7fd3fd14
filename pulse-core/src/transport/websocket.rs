//! WebSocket connector backed by `tokio-tungstenite`.

use super::{Connection, Connector};
use crate::error::{PulseError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Default limit for TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to `ws://` / `wss://` telemetry endpoints.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>> {
        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| PulseError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: format!("handshake timed out after {:?}", self.connect_timeout),
            })?
            .map_err(|e| PulseError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        debug!(endpoint, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                // Invalid UTF-8 is left to the decoder to reject as malformed
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer closed WebSocket");
                    return None;
                }
                // Protocol-level ping/pong is answered by tungstenite
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(PulseError::ConnectionLost { reason: e.to_string() })),
            }
        }
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| PulseError::ConnectionLost { reason: e.to_string() })
    }
}
