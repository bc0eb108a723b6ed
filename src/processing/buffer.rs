//! Bounded per-node measurement history
//!
//! Fixed-capacity FIFO: once full, every append silently evicts the oldest
//! entry. Losing old measurements on overflow is the memory bound, not a
//! failure, so `append` has no error path.

use crate::core::{Measurement, DEFAULT_BUFFER_CAPACITY};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MeasurementBuffer {
    entries: VecDeque<Measurement>,
    capacity: usize,
}

impl Default for MeasurementBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl MeasurementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a measurement, evicting the oldest one when at capacity
    pub fn append(&mut self, measurement: Measurement) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(measurement);
    }

    /// The last `min(k, len)` entries, oldest first
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &Measurement> + '_ {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip)
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeId;
    use proptest::prelude::*;

    fn sample(ts: u64) -> Measurement {
        Measurement::new(NodeId::new("aa:bb"), ts, -40.0)
    }

    #[test]
    fn test_append_below_capacity_keeps_everything() {
        let mut buffer = MeasurementBuffer::with_capacity(4);
        for ts in 0..3 {
            buffer.append(sample(ts));
        }

        assert_eq!(buffer.len(), 3);
        let stamps: Vec<u64> = buffer.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![0, 1, 2]);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = MeasurementBuffer::with_capacity(3);
        for ts in 0..5 {
            buffer.append(sample(ts));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest().map(|m| m.timestamp), Some(4));
        let stamps: Vec<u64> = buffer.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_recent_is_bounded_by_len() {
        let mut buffer = MeasurementBuffer::new();
        assert_eq!(buffer.recent(10).count(), 0);

        buffer.append(sample(7));
        buffer.append(sample(8));

        let stamps: Vec<u64> = buffer.recent(10).map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![7, 8]);
        let stamps: Vec<u64> = buffer.recent(1).map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![8]);
        // recent() must not consume anything
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = MeasurementBuffer::with_capacity(0);
        buffer.append(sample(1));
        buffer.append(sample(2));

        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.latest().map(|m| m.timestamp), Some(2));
    }

    proptest! {
        #[test]
        fn prop_holds_last_capacity_entries_in_order(capacity in 1usize..64, extra in 1usize..200) {
            let total = capacity + extra;
            let mut buffer = MeasurementBuffer::with_capacity(capacity);
            for ts in 0..total as u64 {
                buffer.append(sample(ts));
            }

            let stamps: Vec<u64> = buffer.iter().map(|m| m.timestamp).collect();
            let expected: Vec<u64> = ((total - capacity) as u64..total as u64).collect();
            prop_assert_eq!(stamps, expected);
        }
    }
}
