//! Core data types for the fusion pipeline

use chrono::{DateTime, Utc};
use nalgebra::{Complex, Point2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a sensing node, as carried in the transport addressing
/// (typically the node's MAC address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

/// One observation from one node. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub node_id: NodeId,
    /// Node-reported timestamp (milliseconds on the node's own clock)
    pub timestamp: u64,
    /// Receiver wall clock at decode time
    pub received_at: DateTime<Utc>,
    /// Received signal strength (dB)
    pub signal_strength: f64,
    /// Per-subcarrier channel response, empty when the node sent none
    pub channel_samples: Vec<Complex<f32>>,
    pub channel_id: u8,
    pub bitrate_id: u8,
}

impl Measurement {
    /// Signal-strength-only measurement received now
    pub fn new(node_id: NodeId, timestamp: u64, signal_strength: f64) -> Self {
        Self {
            node_id,
            timestamp,
            received_at: Utc::now(),
            signal_strength,
            channel_samples: Vec::new(),
            channel_id: 0,
            bitrate_id: 0,
        }
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn with_channel_samples(mut self, samples: Vec<Complex<f32>>) -> Self {
        self.channel_samples = samples;
        self
    }

    pub fn with_radio(mut self, channel_id: u8, bitrate_id: u8) -> Self {
        self.channel_id = channel_id;
        self.bitrate_id = bitrate_id;
        self
    }
}

/// Heartbeat statistics reported by a node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeStats {
    pub packet_count: u64,
    pub enabled: bool,
    pub uptime_s: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Anchor position paired with its estimated range to the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangedAnchor {
    pub position: Point2<f64>,
    pub distance: f64,
}

impl RangedAnchor {
    pub fn new(position: Point2<f64>, distance: f64) -> Self {
        Self { position, distance }
    }
}

/// Result of one successful fusion cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Nodes used for the solve, in selection order
    pub contributing_node_ids: Vec<NodeId>,
    /// Estimated ranges (m), same order as `contributing_node_ids`
    pub distances: Vec<f64>,
}

impl PositionEstimate {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}
