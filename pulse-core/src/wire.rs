//! Wire format of the telemetry endpoint.
//!
//! The backend fans out JSON envelopes of the form
//! `{"type": "...", "data": {...}, "timestamp": ...}` and interleaves a bare
//! `ping` heartbeat that must be answered with `pong`.
//!
//! Every text frame decodes to at most one [`Sample`]; anything that does not
//! fit is reported as [`PulseError::MalformedMessage`] for the session to drop.

use crate::error::{PulseError, Result};
use crate::types::{AlertRecord, Channel, LogRecord, Sample, Timestamp};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Heartbeat sent by the backend.
pub const PING: &str = "ping";

/// Heartbeat reply expected by the backend.
pub const PONG: &str = "pong";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Sample(Sample),
    Ping,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    timestamp: RawTimestamp,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(self) -> Result<Timestamp> {
        match self {
            Self::Millis(millis) => Ok(Timestamp::from_millis(millis)),
            Self::Text(text) => Timestamp::parse(&text)
                .ok_or_else(|| PulseError::malformed(format!("unparseable timestamp '{text}'"))),
        }
    }
}

#[derive(Deserialize)]
struct MetricData {
    name: String,
    value: f64,
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Inbound> {
    if text.trim() == PING {
        return Ok(Inbound::Ping);
    }

    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| PulseError::malformed(e.to_string()))?;
    let timestamp = envelope.timestamp.resolve()?;

    let sample = match envelope.kind.as_str() {
        "metric" | "metrics" => {
            let metric: MetricData = data_as(envelope.data, "metric")?;
            if metric.name.trim().is_empty() {
                return Err(PulseError::malformed("metric without a name"));
            }
            if !metric.value.is_finite() {
                return Err(PulseError::malformed(format!(
                    "non-finite value for metric '{}'",
                    metric.name
                )));
            }
            Sample::metric(Channel::metric(metric.name.trim()), timestamp, metric.value)
        }
        "log" | "logs" => Sample::log(timestamp, data_as::<LogRecord>(envelope.data, "log")?),
        "alert" | "alerts" => {
            Sample::alert(timestamp, data_as::<AlertRecord>(envelope.data, "alert")?)
        }
        other => {
            return Err(PulseError::malformed(format!("unknown message type '{other}'")));
        }
    };

    Ok(Inbound::Sample(sample))
}

fn data_as<T: DeserializeOwned>(data: serde_json::Value, kind: &str) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| PulseError::malformed(format!("invalid {kind} data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertLevel, AlertStatus, LogLevel, Payload};

    fn sample(text: &str) -> Sample {
        match decode(text).unwrap() {
            Inbound::Sample(sample) => sample,
            Inbound::Ping => panic!("expected a sample"),
        }
    }

    #[test]
    fn test_decode_metric() {
        let s = sample(
            r#"{"type":"metric","data":{"name":"cpu","value":75},"timestamp":"2024-01-01 00:00:00"}"#,
        );
        assert_eq!(s.channel, Channel::metric("cpu"));
        assert_eq!(s.timestamp, Timestamp::from_millis(1_704_067_200_000));
        assert_eq!(s.payload, Payload::Value(75.0));
    }

    #[test]
    fn test_decode_log_with_millis_timestamp() {
        let s = sample(
            r#"{"type":"logs","data":{"level":"ERROR","source":"backend","message":"boom"},"timestamp":1704067200123}"#,
        );
        assert_eq!(s.channel, Channel::log());
        assert_eq!(s.timestamp.as_millis(), 1_704_067_200_123);
        match s.payload {
            Payload::Log(record) => {
                assert_eq!(record.level, LogLevel::Error);
                assert_eq!(record.message, "boom");
                assert!(record.context.is_empty());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_decode_alert_defaults_to_active() {
        let s = sample(
            r#"{"type":"alert","data":{"level":"critical","message":"CPU high","target":"web-1"},"timestamp":"2024-01-01T00:00:00Z"}"#,
        );
        assert_eq!(s.channel, Channel::alert());
        match s.payload {
            Payload::Alert(record) => {
                assert_eq!(record.level, AlertLevel::Critical);
                assert_eq!(record.status, AlertStatus::Active);
                assert_eq!(record.target, "web-1");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_decode_ping() {
        assert_eq!(decode("ping").unwrap(), Inbound::Ping);
        assert_eq!(decode(" ping\n").unwrap(), Inbound::Ping);
    }

    #[test]
    fn test_decode_malformed() {
        let cases = [
            "not json",
            r#"{"type":"metric","data":{"name":"cpu","value":1}}"#,
            r#"{"type":"metric","data":{"name":"cpu","value":"high"},"timestamp":0}"#,
            r#"{"type":"metric","data":{"name":" ","value":1},"timestamp":0}"#,
            r#"{"type":"heartbeat","data":{},"timestamp":0}"#,
            r#"{"type":"log","data":{"level":"LOUD","message":"x"},"timestamp":0}"#,
            r#"{"type":"alert","data":{"level":"info","message":"x"},"timestamp":"soon"}"#,
        ];
        for case in cases {
            assert!(
                matches!(decode(case), Err(PulseError::MalformedMessage { .. })),
                "expected malformed: {case}"
            );
        }
    }
}
