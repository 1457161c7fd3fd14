//! Per-channel update coalescing.
//!
//! Bursts of samples on a channel are batched so downstream buffers and
//! renderers are touched at most once per `interval`, whatever the inbound
//! message rate:
//!
//! ```text
//!   idle ──push──► armed(deadline = now + interval, batch = [s])
//!   armed ──push──► armed(batch += s)
//!   armed ──deadline──► flush(batch) ──► idle
//! ```
//!
//! A lane is armed only when a sample arrives while it is idle, so a quiet
//! channel costs nothing. Samples are never dropped here; capacity policy lives
//! in the series buffers.
//!
//! The coalescer does not own timers. It is driven with explicit instants, and
//! the caller schedules a wake-up for every [`Admission::Armed`] it receives.

use crate::error::{PulseError, Result};
use crate::types::{Channel, Sample};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default minimum time between flushes of one channel.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of pushing a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The lane was idle and is now armed; flush it at `deadline`.
    Armed { deadline: Instant },
    /// The lane was already armed; the sample joined its batch.
    Queued { pending: usize },
}

#[derive(Debug)]
struct Lane {
    deadline: Instant,
    batch: Vec<Sample>,
}

/// Throttle-with-batching state machine keyed by channel.
#[derive(Debug)]
pub struct Coalescer {
    interval: Duration,
    lanes: HashMap<Channel, Lane>,
}

impl Coalescer {
    /// Create a coalescer. A zero interval is rejected.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(PulseError::InvalidConfig {
                reason: "coalescing interval must be greater than zero".to_string(),
            });
        }
        Ok(Self { interval, lanes: HashMap::new() })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Add a sample to its channel's pending batch.
    pub fn push(&mut self, sample: Sample, now: Instant) -> Admission {
        match self.lanes.get_mut(&sample.channel) {
            Some(lane) => {
                lane.batch.push(sample);
                Admission::Queued { pending: lane.batch.len() }
            }
            None => {
                let deadline = now + self.interval;
                self.lanes.insert(sample.channel.clone(), Lane { deadline, batch: vec![sample] });
                Admission::Armed { deadline }
            }
        }
    }

    /// Take the batch for `channel` if its deadline has passed.
    ///
    /// The lane returns to idle; the next sample re-arms it.
    pub fn take_due(&mut self, channel: &Channel, now: Instant) -> Option<Vec<Sample>> {
        match self.lanes.get(channel) {
            Some(lane) if lane.deadline <= now => {
                self.lanes.remove(channel).map(|lane| lane.batch)
            }
            _ => None,
        }
    }

    /// Take every batch whose deadline has passed.
    pub fn take_all_due(&mut self, now: Instant) -> Vec<(Channel, Vec<Sample>)> {
        let due: Vec<Channel> = self
            .lanes
            .iter()
            .filter(|(_, lane)| lane.deadline <= now)
            .map(|(channel, _)| channel.clone())
            .collect();
        due.into_iter()
            .filter_map(|channel| {
                self.lanes.remove(&channel).map(|lane| (channel, lane.batch))
            })
            .collect()
    }

    /// Take every pending batch regardless of deadline.
    pub fn drain(&mut self) -> Vec<(Channel, Vec<Sample>)> {
        self.lanes.drain().map(|(channel, lane)| (channel, lane.batch)).collect()
    }

    /// Earliest armed deadline, if any lane is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lanes.values().map(|lane| lane.deadline).min()
    }

    /// Samples waiting for `channel`.
    pub fn pending(&self, channel: &Channel) -> usize {
        self.lanes.get(channel).map_or(0, |lane| lane.batch.len())
    }

    /// Samples waiting across all channels.
    pub fn pending_total(&self) -> usize {
        self.lanes.values().map(|lane| lane.batch.len()).sum()
    }

    /// Number of armed lanes.
    pub fn armed(&self) -> usize {
        self.lanes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn sample(channel: &Channel, t: i64) -> Sample {
        Sample::metric(channel.clone(), Timestamp::from_millis(t), t as f64)
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(Coalescer::new(Duration::ZERO), Err(PulseError::InvalidConfig { .. })));
    }

    #[test]
    fn test_burst_within_interval_flushes_once() {
        let cpu = Channel::metric("cpu");
        let mut coalescer = Coalescer::new(Duration::from_millis(100)).unwrap();
        let start = Instant::now();

        let first = coalescer.push(sample(&cpu, 0), start);
        assert_eq!(first, Admission::Armed { deadline: start + Duration::from_millis(100) });

        for t in 1..10 {
            let admission = coalescer.push(sample(&cpu, t), start + Duration::from_millis(t as u64));
            assert_eq!(admission, Admission::Queued { pending: t as usize + 1 });
        }

        assert!(coalescer.take_due(&cpu, start + Duration::from_millis(99)).is_none());

        let batch = coalescer.take_due(&cpu, start + Duration::from_millis(100)).unwrap();
        let order: Vec<i64> = batch.iter().map(|s| s.timestamp.as_millis()).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert_eq!(coalescer.armed(), 0);
        assert!(coalescer.take_due(&cpu, start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_batch_preserves_arrival_order_not_timestamp_order() {
        let log = Channel::log();
        let mut coalescer = Coalescer::new(Duration::from_millis(50)).unwrap();
        let now = Instant::now();
        for t in [30, 10, 20] {
            coalescer.push(sample(&log, t), now);
        }
        let batch = coalescer.take_due(&log, now + Duration::from_millis(50)).unwrap();
        let order: Vec<i64> = batch.iter().map(|s| s.timestamp.as_millis()).collect();
        assert_eq!(order, vec![30, 10, 20]);
    }

    #[test]
    fn test_rearms_only_after_new_sample() {
        let cpu = Channel::metric("cpu");
        let interval = Duration::from_millis(100);
        let mut coalescer = Coalescer::new(interval).unwrap();
        let start = Instant::now();

        coalescer.push(sample(&cpu, 0), start);
        coalescer.take_due(&cpu, start + interval).unwrap();
        assert_eq!(coalescer.next_deadline(), None);

        let later = start + Duration::from_millis(130);
        assert_eq!(
            coalescer.push(sample(&cpu, 1), later),
            Admission::Armed { deadline: later + interval }
        );
    }

    #[test]
    fn test_channels_are_independent() {
        let cpu = Channel::metric("cpu");
        let log = Channel::log();
        let mut coalescer = Coalescer::new(Duration::from_millis(100)).unwrap();
        let start = Instant::now();

        coalescer.push(sample(&cpu, 0), start);
        for t in 0..50 {
            coalescer.push(sample(&log, t), start + Duration::from_millis(40));
        }

        let due = coalescer.take_all_due(start + Duration::from_millis(100));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, cpu);
        assert_eq!(coalescer.pending(&log), 50);
        assert_eq!(coalescer.next_deadline(), Some(start + Duration::from_millis(140)));
    }

    #[test]
    fn test_drain_returns_everything() {
        let mut coalescer = Coalescer::new(Duration::from_secs(1)).unwrap();
        let now = Instant::now();
        coalescer.push(sample(&Channel::metric("cpu"), 0), now);
        coalescer.push(sample(&Channel::alert(), 0), now);

        let drained = coalescer.drain();
        assert_eq!(drained.iter().map(|(_, batch)| batch.len()).sum::<usize>(), 2);
        assert_eq!(coalescer.armed(), 0);
    }
}
