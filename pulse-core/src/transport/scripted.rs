//! In-memory connector with a scripted sequence of connection outcomes.
//!
//! Each call to [`Connector::connect`] consumes the next scripted step: either
//! a refusal or an accepted connection whose server side is driven through a
//! [`Peer`]. Once the script is exhausted, further attempts stay pending, which
//! keeps schedules deterministic under a paused tokio clock.

use super::{Connection, Connector};
use crate::error::{PulseError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

enum Step {
    Refuse(String),
    Accept(ScriptedConnection),
}

/// Connector that replays a script of connection outcomes.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a failed connection attempt.
    pub fn refuse(&self, reason: &str) {
        self.script.lock().push_back(Step::Refuse(reason.to_string()));
    }

    /// Script a successful connection attempt and return its server side.
    pub fn accept(&self) -> Peer {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Arc::new(Mutex::new(Vec::new()));
        self.script
            .lock()
            .push_back(Step::Accept(ScriptedConnection { inbound: rx, outbound: outbound.clone() }));
        Peer { tx, outbound }
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Refuse(reason)) => {
                Err(PulseError::ConnectFailed { endpoint: endpoint.to_string(), reason })
            }
            Some(Step::Accept(connection)) => Ok(Box::new(connection)),
            None => std::future::pending().await,
        }
    }
}

/// Client side of a scripted connection.
struct ScriptedConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn recv(&mut self) -> Option<Result<String>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        self.outbound.lock().push(text.to_string());
        Ok(())
    }
}

/// Server side of a scripted connection. Dropping it closes the connection.
pub struct Peer {
    tx: mpsc::UnboundedSender<String>,
    outbound: Arc<Mutex<Vec<String>>>,
}

impl Peer {
    /// Push a text frame to the client. Returns false once the client is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    /// Messages the client sent back (heartbeat replies).
    pub fn received(&self) -> Vec<String> {
        self.outbound.lock().clone()
    }

    /// Close the connection from the server side.
    pub fn close(self) {}
}
