//! Dashboard coordinator.
//!
//! Wires the pipeline together behind one surface:
//!
//! ```text
//! TransportSession ──on_sample──► Coalescer ──flush timer──► SeriesBuffer (per channel)
//!        │                                                        │
//!        └──on_state_change──► watch<ConnectionState>             └──► channel_snapshot(viewport)
//! ```
//!
//! The coordinator exclusively owns every buffer. All mutation happens inside
//! short synchronous critical sections (sample admission, batch flush, seed),
//! so readers never observe a buffer mid-update and only ever receive owned
//! copies of the window they asked for.

use crate::buffer::SeriesBuffer;
use crate::coalescer::{Admission, Coalescer};
use crate::config::{CapacityConfig, PulseConfig};
use crate::error::{PulseError, Result};
use crate::observability::metrics as pipeline_metrics;
use crate::projector::{self, Viewport, Window};
use crate::transport::{
    validate_endpoint, Connector, SessionHandler, SessionStats, TransportSession,
    WebSocketConnector,
};
use crate::types::{Channel, ConnectionState, Sample};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

/// Maximum number of flush notifications buffered per subscriber.
const FLUSH_EVENT_BUFFER_SIZE: usize = 256;

/// Notification that a channel buffer changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushEvent {
    pub channel: Channel,
    /// Samples delivered in this flush
    pub batch_len: usize,
    /// Buffer version after the flush
    pub version: u64,
}

/// Summary of one channel, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub len: usize,
    pub capacity: usize,
    pub version: u64,
    pub evicted: u64,
    /// Samples waiting in the coalescer
    pub pending: usize,
    pub newest: Option<Sample>,
}

/// Pipeline-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub session: SessionStats,
    pub channels: usize,
    pub buffered: usize,
    pub pending: usize,
    pub evicted: u64,
}

struct CoreState {
    running: bool,
    coalescer: Coalescer,
    buffers: HashMap<Channel, SeriesBuffer>,
    timers: HashMap<Channel, JoinHandle<()>>,
}

struct Core {
    me: Weak<Core>,
    capacity: CapacityConfig,
    state: Mutex<CoreState>,
    connection: watch::Sender<ConnectionState>,
    flushes: broadcast::Sender<FlushEvent>,
}

impl Core {
    fn buffer_for<'a>(
        &self,
        buffers: &'a mut HashMap<Channel, SeriesBuffer>,
        channel: &Channel,
    ) -> Result<&'a mut SeriesBuffer> {
        match buffers.entry(channel.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let capacity = self.capacity.for_channel(channel);
                debug!(channel = %channel, capacity, "Creating series buffer");
                Ok(entry.insert(SeriesBuffer::new(channel.clone(), capacity)?))
            }
        }
    }

    /// Insert a batch into its channel buffer and notify subscribers.
    fn apply_batch(&self, state: &mut CoreState, channel: Channel, batch: Vec<Sample>) -> Result<()> {
        let buffer = self.buffer_for(&mut state.buffers, &channel)?;
        let batch_len = batch.len();
        let evicted = buffer.extend(batch);
        pipeline_metrics::record_flush(&channel, batch_len, evicted, buffer.len());
        let version = buffer.version();
        let _ = self.flushes.send(FlushEvent { channel, batch_len, version });
        Ok(())
    }

    /// Flush `channel` if its coalescing deadline has passed.
    fn flush_due(&self, channel: &Channel) {
        let mut state = self.state.lock();
        state.timers.remove(channel);
        if let Some(batch) = state.coalescer.take_due(channel, Instant::now()) {
            if let Err(e) = self.apply_batch(&mut state, channel.clone(), batch) {
                error!(channel = %channel, error = %e, "Failed to flush batch");
            }
        }
    }

    fn arm_timer(&self, channel: Channel, deadline: Instant) -> JoinHandle<()> {
        let core = self.me.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(core) = core.upgrade() {
                core.flush_due(&channel);
            }
        })
    }
}

impl SessionHandler for Core {
    fn on_state_change(&self, state: &ConnectionState) {
        self.connection.send_replace(state.clone());
    }

    fn on_sample(&self, sample: Sample) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        let channel = sample.channel.clone();
        if let Admission::Armed { deadline } = state.coalescer.push(sample, Instant::now()) {
            let timer = self.arm_timer(channel.clone(), deadline);
            state.timers.insert(channel, timer);
        }
    }
}

/// Owns the transport session and every channel buffer of one dashboard.
pub struct Coordinator {
    core: Arc<Core>,
    session: TransportSession,
}

impl Coordinator {
    /// Create a coordinator. The configuration is validated up front.
    pub fn new(config: &PulseConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let coalescer = Coalescer::new(config.coalesce_interval())?;
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (flushes, _) = broadcast::channel(FLUSH_EVENT_BUFFER_SIZE);

        let core = Arc::new_cyclic(|me| Core {
            me: me.clone(),
            capacity: config.capacity.clone(),
            state: Mutex::new(CoreState {
                running: false,
                coalescer,
                buffers: HashMap::new(),
                timers: HashMap::new(),
            }),
            connection,
            flushes,
        });

        Ok(Self { core, session: TransportSession::new(connector, config.session_options()) })
    }

    /// Create a coordinator that connects over WebSocket.
    pub fn websocket(config: &PulseConfig) -> Result<Self> {
        let connector = WebSocketConnector::with_connect_timeout(config.connect_timeout());
        Self::new(config, Arc::new(connector))
    }

    /// Connect to `endpoint` and start routing samples into buffers.
    ///
    /// Idempotent while the session is active. Must be called from within a
    /// tokio runtime.
    #[instrument(skip(self))]
    pub fn start(&self, endpoint: &str) -> Result<()> {
        validate_endpoint(endpoint)?;
        self.core.state.lock().running = true;
        if self.session.open(endpoint, self.core.clone())? {
            info!(endpoint, "Telemetry pipeline started");
        }
        Ok(())
    }

    /// Close the session and cancel pending flush timers.
    ///
    /// Samples already accepted by the coalescer are written to their buffers
    /// immediately; buffers stay readable afterwards.
    pub fn stop(&self) {
        self.session.close();

        let mut state = self.core.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        let pending = state.coalescer.drain();
        for (channel, batch) in pending {
            if let Err(e) = self.core.apply_batch(&mut state, channel.clone(), batch) {
                error!(channel = %channel, error = %e, "Failed to flush batch on stop");
            }
        }
        info!("Telemetry pipeline stopped");
    }

    /// Bulk-load history for `channel`, e.g. a REST backfill on mount.
    ///
    /// Equivalent to inserting every sample in turn, so capacity and ordering
    /// rules apply. Every sample must belong to `channel`.
    pub fn seed<I>(&self, channel: &Channel, samples: I) -> Result<()>
    where
        I: IntoIterator<Item = Sample>,
    {
        let samples: Vec<Sample> = samples.into_iter().collect();
        if let Some(stray) = samples.iter().find(|s| &s.channel != channel) {
            return Err(PulseError::ChannelMismatch {
                expected: channel.to_string(),
                found: stray.channel.to_string(),
            });
        }
        debug!(channel = %channel, count = samples.len(), "Seeding channel");
        let mut state = self.core.state.lock();
        self.core.apply_batch(&mut state, channel.clone(), samples)
    }

    /// Window over `channel` for the given viewport.
    ///
    /// Unknown channels yield an empty window.
    pub fn channel_snapshot(&self, channel: &Channel, viewport: Viewport) -> Window {
        let state = self.core.state.lock();
        state
            .buffers
            .get(channel)
            .map(|buffer| projector::project(buffer, viewport))
            .unwrap_or_default()
    }

    /// Window over the newest `size` samples of `channel`.
    pub fn channel_tail(&self, channel: &Channel, size: usize) -> Window {
        let state = self.core.state.lock();
        state
            .buffers
            .get(channel)
            .map(|buffer| projector::project(buffer, Viewport::tail(buffer.len(), size)))
            .unwrap_or_default()
    }

    /// Summaries of every channel with a buffer, sorted by name.
    pub fn channels(&self) -> Vec<ChannelSummary> {
        let state = self.core.state.lock();
        let mut summaries: Vec<ChannelSummary> = state
            .buffers
            .values()
            .map(|buffer| ChannelSummary {
                channel: buffer.channel().clone(),
                len: buffer.len(),
                capacity: buffer.capacity(),
                version: buffer.version(),
                evicted: buffer.evicted(),
                pending: state.coalescer.pending(buffer.channel()),
                newest: buffer.newest().cloned(),
            })
            .collect();
        summaries.sort_by(|a, b| a.channel.cmp(&b.channel));
        summaries
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.core.connection.borrow().clone()
    }

    /// Receiver for connection indicator updates.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.core.connection.subscribe()
    }

    /// Receiver for buffer change notifications.
    pub fn subscribe_flushes(&self) -> broadcast::Receiver<FlushEvent> {
        self.core.flushes.subscribe()
    }

    pub fn stats(&self) -> PipelineStats {
        let state = self.core.state.lock();
        PipelineStats {
            session: self.session.stats(),
            channels: state.buffers.len(),
            buffered: state.buffers.values().map(SeriesBuffer::len).sum(),
            pending: state.coalescer.pending_total(),
            evicted: state.buffers.values().map(SeriesBuffer::evicted).sum(),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}
