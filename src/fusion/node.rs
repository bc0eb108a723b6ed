//! Per-node mutable state

use crate::core::{Measurement, NodeId, NodeStats};
use crate::processing::MeasurementBuffer;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct NodeState {
    pub node_id: NodeId,
    pub buffer: MeasurementBuffer,
    pub stats: NodeStats,
    /// Receiver time of the most recent data sample
    pub last_data_at: Option<DateTime<Utc>>,
    /// Whether the node has a configured position
    pub registered: bool,
}

impl NodeState {
    pub fn new(node_id: NodeId, capacity: usize, registered: bool) -> Self {
        Self {
            node_id,
            buffer: MeasurementBuffer::with_capacity(capacity),
            stats: NodeStats::default(),
            last_data_at: None,
            registered,
        }
    }

    pub fn record(&mut self, measurement: Measurement) {
        self.last_data_at = Some(match self.last_data_at {
            Some(prev) if prev > measurement.received_at => prev,
            _ => measurement.received_at,
        });
        self.buffer.append(measurement);
    }

    /// Has data, and when a cutoff is given, that data is recent enough
    pub fn has_fresh_data(&self, now: DateTime<Utc>, stale_after: Option<Duration>) -> bool {
        match (self.last_data_at, stale_after) {
            (None, _) => false,
            (Some(_), None) => !self.buffer.is_empty(),
            (Some(at), Some(cutoff)) => !self.buffer.is_empty() && now - at <= cutoff,
        }
    }
}
