//! Connection state of the transport session.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle state of the telemetry connection.
///
/// Owned by the transport session; everything else only ever sees copies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no retry pending
    #[default]
    Disconnected,

    /// A connection attempt is in flight
    Connecting,

    /// Connected and receiving
    Open,

    /// Waiting before the next connection attempt
    Backoff {
        /// Consecutive failures since the last successful open (starts at 1)
        attempt: u32,
        /// When the next attempt will start
        retry_at: Instant,
        /// Delay chosen for this attempt, jitter included
        delay: Duration,
    },
}

impl ConnectionState {
    /// Whether the session is active (connected or working towards it).
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Backoff attempt number, if backing off.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Self::Backoff { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Backoff { attempt, delay, .. } => {
                write!(f, "backoff (attempt {}, retry in {:.1}s)", attempt, delay.as_secs_f64())
            }
        }
    }
}
