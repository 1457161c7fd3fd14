//! Transport session: one persistent connection, recovered automatically.

use super::{BackoffPolicy, Connection, Connector};
use crate::error::{PulseError, Result};
use crate::observability::metrics as pipeline_metrics;
use crate::types::{ConnectionState, Sample};
use crate::wire::{self, Inbound, PONG};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default time without any inbound frame before a connection is declared dead.
///
/// The backend heartbeats every 30 seconds, so this tolerates one late ping.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

/// Receives session events.
///
/// Both callbacks run synchronously on the session's task while the session
/// lock is held, which is what guarantees that nothing is delivered after
/// [`TransportSession::close`] returns. Implementations must therefore not
/// call back into the session.
pub trait SessionHandler: Send + Sync + 'static {
    /// Called on every state transition.
    fn on_state_change(&self, state: &ConnectionState);

    /// Called for every successfully decoded sample.
    fn on_sample(&self, sample: Sample);
}

/// Tunables of a transport session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub backoff: BackoffPolicy,
    /// `None` waits forever for the next frame
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { backoff: BackoffPolicy::default(), idle_timeout: Some(DEFAULT_IDLE_TIMEOUT) }
    }
}

/// Counters kept by a session across reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub messages_received: u64,
    pub samples_decoded: u64,
    pub malformed_dropped: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
}

#[derive(Default)]
struct Counters {
    messages_received: AtomicU64,
    samples_decoded: AtomicU64,
    malformed_dropped: AtomicU64,
    connect_failures: AtomicU64,
    disconnects: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> SessionStats {
        SessionStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            samples_decoded: self.samples_decoded.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    /// Bumped on every open/close; tasks from older generations are stale
    generation: u64,
    handler: Option<Arc<dyn SessionHandler>>,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    counters: Counters,
}

impl Shared {
    /// Apply a transition on behalf of the task of `generation`.
    ///
    /// Returns false when that task has been superseded and must stop.
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        Self::apply(&mut inner, state);
        true
    }

    fn apply(inner: &mut Inner, state: ConnectionState) {
        debug!(state = %state, "Connection state changed");
        pipeline_metrics::set_connection_state(&state);
        inner.state = state;
        if let Some(handler) = &inner.handler {
            handler.on_state_change(&inner.state);
        }
    }

    /// Hand a sample to the handler unless the task has been superseded.
    fn deliver(&self, generation: u64, sample: Sample) -> bool {
        let inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        self.counters.samples_decoded.fetch_add(1, Ordering::Relaxed);
        if let Some(handler) = &inner.handler {
            handler.on_sample(sample);
        }
        true
    }
}

/// Why an open connection ended.
enum Disconnect {
    Closed,
    Failed(PulseError),
    IdleTimeout(Duration),
    Superseded,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed by peer"),
            Self::Failed(e) => write!(f, "{e}"),
            Self::IdleTimeout(limit) => write!(f, "no frames for {:?}", limit),
            Self::Superseded => write!(f, "session closed"),
        }
    }
}

/// Owns the connection lifecycle for one telemetry endpoint.
///
/// At most one connection task is alive at a time. The task connects, pumps
/// frames into the handler, and on any failure backs off and retries until
/// [`close`](Self::close) is called.
pub struct TransportSession {
    connector: Arc<dyn Connector>,
    options: SessionOptions,
    shared: Arc<Shared>,
}

impl TransportSession {
    pub fn new(connector: Arc<dyn Connector>, options: SessionOptions) -> Self {
        Self {
            connector,
            options,
            shared: Arc::new(Shared { inner: Mutex::new(Inner::default()), counters: Counters::default() }),
        }
    }

    /// Start connecting to `endpoint`.
    ///
    /// A no-op returning `Ok(false)` while the session is already connecting,
    /// open or backing off. Must be called from within a tokio runtime.
    #[instrument(skip(self, handler))]
    pub fn open(&self, endpoint: &str, handler: Arc<dyn SessionHandler>) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current().map_err(PulseError::internal)?;

        let mut inner = self.shared.inner.lock();
        if inner.state.is_active() {
            debug!(state = %inner.state, "Session already active, ignoring open");
            return Ok(false);
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.handler = Some(handler);
        Shared::apply(&mut inner, ConnectionState::Connecting);

        info!(endpoint, "Opening telemetry session");
        inner.task = Some(runtime.spawn(run(
            self.shared.clone(),
            self.connector.clone(),
            self.options.clone(),
            endpoint.to_string(),
            generation,
        )));
        Ok(true)
    }

    /// Close the session from any state.
    ///
    /// Cancels the connection task (and with it any pending retry), drops the
    /// connection and reports `Disconnected`. No callback fires after this
    /// returns.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        if inner.state.is_active() {
            info!("Closing telemetry session");
            Shared::apply(&mut inner, ConnectionState::Disconnected);
        }
        inner.handler = None;
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state.clone()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    options: SessionOptions,
    endpoint: String,
    generation: u64,
) {
    let mut attempt: u32 = 0;

    loop {
        match connector.connect(&endpoint).await {
            Ok(mut connection) => {
                attempt = 0;
                if !shared.transition(generation, ConnectionState::Open) {
                    return;
                }
                info!(endpoint = %endpoint, "Telemetry connection open");

                let reason = pump(&shared, generation, connection.as_mut(), options.idle_timeout).await;
                if matches!(reason, Disconnect::Superseded) {
                    return;
                }
                warn!(endpoint = %endpoint, reason = %reason, "Telemetry connection lost");
                shared.counters.disconnects.fetch_add(1, Ordering::Relaxed);
                pipeline_metrics::record_disconnect();
            }
            Err(e) => {
                warn!(endpoint = %endpoint, attempt = attempt + 1, error = %e, "Telemetry connect failed");
                shared.counters.connect_failures.fetch_add(1, Ordering::Relaxed);
                pipeline_metrics::record_connect_failure();
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = options.backoff.delay(attempt, &mut rand::thread_rng());
        let retry_at = Instant::now() + delay;
        if !shared.transition(generation, ConnectionState::Backoff { attempt, retry_at, delay }) {
            return;
        }

        tokio::time::sleep_until(retry_at).await;

        if !shared.transition(generation, ConnectionState::Connecting) {
            return;
        }
    }
}

async fn pump(
    shared: &Shared,
    generation: u64,
    connection: &mut dyn Connection,
    idle_timeout: Option<Duration>,
) -> Disconnect {
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, connection.recv()).await {
                Ok(next) => next,
                Err(_) => return Disconnect::IdleTimeout(limit),
            },
            None => connection.recv().await,
        };

        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Disconnect::Failed(e),
            None => return Disconnect::Closed,
        };

        shared.counters.messages_received.fetch_add(1, Ordering::Relaxed);
        pipeline_metrics::record_message_received();

        match wire::decode(&text) {
            Ok(Inbound::Sample(sample)) => {
                if !shared.deliver(generation, sample) {
                    return Disconnect::Superseded;
                }
            }
            Ok(Inbound::Ping) => {
                if let Err(e) = connection.send(PONG).await {
                    return Disconnect::Failed(e);
                }
            }
            Err(e) => {
                shared.counters.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                pipeline_metrics::record_malformed_message();
                warn!(error = %e, "Dropping malformed telemetry message");
            }
        }
    }
}
