//! Bounded, timestamp-ordered sample storage.
//!
//! One [`SeriesBuffer`] holds the most recent `capacity` samples of a single
//! channel. Inserts locate their slot by binary search, so network reordering
//! and coalesced batches land in timestamp order without re-sorting. Appends in
//! timestamp order, the common case, are O(1).
//!
//! When an insert pushes the buffer over capacity, the oldest *previously
//! retained* sample is evicted. For in-order arrival this is plain drop-oldest;
//! a late sample older than everything retained is still kept, since it may
//! legitimately belong in history, and displaces the oldest of the rest.

use crate::error::{PulseError, Result};
use crate::types::{Channel, Sample};
use std::collections::VecDeque;

/// Fixed-capacity, timestamp-ordered store for one channel.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    channel: Channel,
    capacity: usize,
    samples: VecDeque<Sample>,
    /// Bumped on every mutation
    version: u64,
    evicted: u64,
}

impl SeriesBuffer {
    /// Create an empty buffer. A capacity of zero is rejected.
    pub fn new(channel: Channel, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PulseError::InvalidCapacity { channel: channel.to_string() });
        }
        Ok(Self {
            channel,
            capacity,
            samples: VecDeque::with_capacity(capacity.min(1024)),
            version: 0,
            evicted: 0,
        })
    }

    /// Insert one sample in timestamp order, evicting if over capacity.
    ///
    /// Samples with equal timestamps keep their arrival order. Returns the
    /// number of samples evicted (0 or 1).
    pub fn insert(&mut self, sample: Sample) -> usize {
        debug_assert_eq!(sample.channel, self.channel, "sample routed to the wrong buffer");

        let pos = self.samples.partition_point(|s| s.timestamp <= sample.timestamp);
        if pos == self.samples.len() {
            self.samples.push_back(sample);
        } else {
            self.samples.insert(pos, sample);
        }
        self.version += 1;

        let mut evicted = 0;
        while self.samples.len() > self.capacity {
            let victim = if pos == 0 { 1 } else { 0 };
            self.samples.remove(victim);
            evicted += 1;
        }
        self.evicted += evicted as u64;
        evicted
    }

    /// Insert a batch, equivalent to repeated [`insert`](Self::insert).
    ///
    /// Returns the total number of samples evicted.
    pub fn extend<I>(&mut self, samples: I) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        samples.into_iter().map(|sample| self.insert(sample)).sum()
    }

    /// Ordered copy of the current contents.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Ordered view over the contents without copying.
    pub fn samples(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mutation counter, usable as a cheap change detector.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Total samples evicted since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn cpu(t: i64) -> Sample {
        Sample::metric(Channel::metric("cpu"), Timestamp::from_millis(t), t as f64)
    }

    fn timestamps(buffer: &SeriesBuffer) -> Vec<i64> {
        buffer.samples().iter().map(|s| s.timestamp.as_millis()).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SeriesBuffer::new(Channel::metric("cpu"), 0).unwrap_err();
        assert!(matches!(err, PulseError::InvalidCapacity { .. }));
    }

    #[test]
    fn test_evicts_oldest_on_overflow() {
        let mut buffer = SeriesBuffer::new(Channel::metric("cpu"), 3).unwrap();
        for t in 0..4 {
            buffer.insert(cpu(t));
        }
        assert_eq!(timestamps(&buffer), vec![1, 2, 3]);
        assert_eq!(buffer.evicted(), 1);
    }

    #[test]
    fn test_out_of_order_inserts_are_sorted() {
        let mut buffer = SeriesBuffer::new(Channel::metric("cpu"), 10).unwrap();
        for t in [5, 1, 4, 2, 3] {
            buffer.insert(cpu(t));
        }
        assert_eq!(timestamps(&buffer), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut buffer = SeriesBuffer::new(Channel::metric("cpu"), 10).unwrap();
        for value in [1.0, 2.0, 3.0] {
            buffer.insert(Sample::metric(Channel::metric("cpu"), Timestamp::from_millis(7), value));
        }
        buffer.insert(cpu(3));

        let values: Vec<f64> = buffer.samples().iter().filter_map(|s| s.payload.value()).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_late_sample_at_capacity_is_retained() {
        let mut buffer = SeriesBuffer::new(Channel::metric("cpu"), 5).unwrap();
        buffer.extend((0..10).map(cpu));
        assert_eq!(timestamps(&buffer), vec![5, 6, 7, 8, 9]);

        let evicted = buffer.insert(cpu(4));
        assert_eq!(evicted, 1);
        assert_eq!(timestamps(&buffer), vec![4, 6, 7, 8, 9]);
    }

    #[test]
    fn test_version_tracks_mutations() {
        let mut buffer = SeriesBuffer::new(Channel::metric("cpu"), 2).unwrap();
        assert_eq!(buffer.version(), 0);
        buffer.extend((0..3).map(cpu));
        assert_eq!(buffer.version(), 3);
        assert_eq!(buffer.oldest().map(|s| s.timestamp.as_millis()), Some(1));
        assert_eq!(buffer.newest().map(|s| s.timestamp.as_millis()), Some(2));
    }
}
