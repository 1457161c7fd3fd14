//! Telemetry samples and their payloads.

use super::Channel;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Point in time of a sample, in unix milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64)
    }

    /// Parse a textual timestamp.
    ///
    /// Accepts RFC 3339, ISO-8601 without an offset (read as UTC) and the
    /// `YYYY-MM-DD HH:MM:SS` form used by the console.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(dt.timestamp_millis()));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    #[serde(alias = "WARNING")]
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warn => write!(f, "WARN"),
            Self::Info => write!(f, "INFO"),
            Self::Debug => write!(f, "DEBUG"),
        }
    }
}

/// One line of the log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,

    /// Emitting service or host
    #[serde(default)]
    pub source: String,

    pub message: String,

    /// Free-form structured fields (trace id, user id, ...)
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Resolved,
}

/// One event of the alert stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(default)]
    pub id: String,

    pub level: AlertLevel,

    pub message: String,

    /// Server or service the alert fired for
    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub status: AlertStatus,
}

/// Sample payload.
///
/// Records are reference counted so that projecting a window only bumps
/// counters instead of deep-copying log lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Value(f64),
    Log(Arc<LogRecord>),
    Alert(Arc<AlertRecord>),
}

impl Payload {
    /// Numeric value for metric payloads.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::Log(log) => write!(f, "[{}] {}: {}", log.level, log.source, log.message),
            Self::Alert(alert) => {
                write!(f, "[{}] {} ({})", alert.level, alert.message, alert.target)
            }
        }
    }
}

/// One timestamped unit of telemetry on a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub channel: Channel,
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl Sample {
    pub fn new(channel: Channel, timestamp: Timestamp, payload: Payload) -> Self {
        Self { channel, timestamp, payload }
    }

    /// Numeric sample on a metric channel.
    pub fn metric(channel: Channel, timestamp: Timestamp, value: f64) -> Self {
        Self::new(channel, timestamp, Payload::Value(value))
    }

    /// Log line on the log channel.
    pub fn log(timestamp: Timestamp, record: LogRecord) -> Self {
        Self::new(Channel::log(), timestamp, Payload::Log(Arc::new(record)))
    }

    /// Alert event on the alert channel.
    pub fn alert(timestamp: Timestamp, record: AlertRecord) -> Self {
        Self::new(Channel::alert(), timestamp, Payload::Alert(Arc::new(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_parse_formats() {
        let expected = Timestamp::from_millis(1_704_067_200_000);
        assert_eq!(Timestamp::parse("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(Timestamp::parse("2024-01-01T08:00:00+08:00"), Some(expected));
        assert_eq!(Timestamp::parse("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(Timestamp::parse("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(
            Timestamp::parse("2024-01-01T00:00:00.250000"),
            Some(Timestamp::from_millis(1_704_067_200_250))
        );
        assert_eq!(Timestamp::parse("yesterday"), None);
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Timestamp::from_millis(1_704_067_200_000).to_string(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_log_level_aliases() {
        let level: LogLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
    }
}
