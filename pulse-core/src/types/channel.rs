//! Channel identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Prefix shared by every metric channel (e.g., `metric:cpu`).
pub const METRIC_PREFIX: &str = "metric:";

/// Name of the log stream channel.
pub const LOG_CHANNEL: &str = "log";

/// Name of the alert stream channel.
pub const ALERT_CHANNEL: &str = "alert";

/// A named telemetry stream.
///
/// Channels are immutable once created and cheap to clone, so they can be used
/// freely as map keys by the coalescer and the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Arc<str>);

/// Classification of a channel by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind<'a> {
    /// A numeric series, carrying the metric name without the prefix
    Metric(&'a str),
    /// The log stream
    Log,
    /// The alert stream
    Alert,
    /// Any other name
    Other,
}

impl Channel {
    /// Create a channel from its full name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Metric channel for `name` (`cpu` becomes `metric:cpu`).
    pub fn metric(name: &str) -> Self {
        Self::new(format!("{METRIC_PREFIX}{name}"))
    }

    /// The log stream channel.
    pub fn log() -> Self {
        Self::new(LOG_CHANNEL)
    }

    /// The alert stream channel.
    pub fn alert() -> Self {
        Self::new(ALERT_CHANNEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the channel by name.
    pub fn kind(&self) -> ChannelKind<'_> {
        match self.as_str() {
            LOG_CHANNEL => ChannelKind::Log,
            ALERT_CHANNEL => ChannelKind::Alert,
            name => match name.strip_prefix(METRIC_PREFIX) {
                Some(metric) if !metric.is_empty() => ChannelKind::Metric(metric),
                _ => ChannelKind::Other,
            },
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind() {
        assert_eq!(Channel::metric("cpu").kind(), ChannelKind::Metric("cpu"));
        assert_eq!(Channel::log().kind(), ChannelKind::Log);
        assert_eq!(Channel::alert().kind(), ChannelKind::Alert);
        assert_eq!(Channel::new("metric:").kind(), ChannelKind::Other);
        assert_eq!(Channel::new("deploys").kind(), ChannelKind::Other);
    }

    #[test]
    fn test_channel_equality_by_name() {
        assert_eq!(Channel::metric("memory"), Channel::from("metric:memory"));
        assert_eq!(Channel::log().to_string(), "log");
    }
}
