//! Downstream representations of a position estimate

use crate::core::{NodeId, PositionEstimate};
use crate::transport::error::SinkError;
use crate::utils::config::PublishConfig;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// Raw local-frame position record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub x: f64,
    pub y: f64,
    /// ISO-8601 UTC
    pub timestamp: String,
    pub confidence: f64,
    pub source: String,
    pub nodes: Vec<NodeId>,
}

/// Geographic device-tracker record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerAttributes {
    pub latitude: f64,
    pub longitude: f64,
    pub gps_accuracy: f64,
    pub source_type: String,
}

pub struct PositionFormatter {
    pub source_tag: String,
    /// Local meters per geographic degree
    pub geo_scale: f64,
    pub gps_accuracy: f64,
    /// Decimal places kept in the raw position record
    pub precision: u8,
}

impl Default for PositionFormatter {
    fn default() -> Self {
        Self::from_config(&PublishConfig::default())
    }
}

impl PositionFormatter {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            source_tag: config.source_tag.clone(),
            geo_scale: config.geo_scale,
            gps_accuracy: config.gps_accuracy,
            precision: 2,
        }
    }

    pub fn position_state(&self, estimate: &PositionEstimate) -> PositionState {
        PositionState {
            x: self.round_to_precision(estimate.x),
            y: self.round_to_precision(estimate.y),
            timestamp: estimate.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            confidence: estimate.confidence,
            source: self.source_tag.clone(),
            nodes: estimate.contributing_node_ids.clone(),
        }
    }

    /// Linear local-to-geographic mapping: y is latitude, x is longitude
    pub fn tracker_attributes(&self, estimate: &PositionEstimate) -> TrackerAttributes {
        TrackerAttributes {
            latitude: estimate.y / self.geo_scale,
            longitude: estimate.x / self.geo_scale,
            gps_accuracy: self.gps_accuracy,
            source_type: "router".to_string(),
        }
    }

    pub fn position_json(&self, estimate: &PositionEstimate) -> Result<Vec<u8>, SinkError> {
        encode("position", &self.position_state(estimate))
    }

    pub fn tracker_json(&self, estimate: &PositionEstimate) -> Result<Vec<u8>, SinkError> {
        encode("tracker", &self.tracker_attributes(estimate))
    }

    fn round_to_precision(&self, value: f64) -> f64 {
        let multiplier = 10_f64.powi(self.precision as i32);
        (value * multiplier).round() / multiplier
    }
}

fn encode<T: Serialize>(record: &'static str, value: &T) -> Result<Vec<u8>, SinkError> {
    serde_json::to_vec(value).map_err(|e| SinkError::Encode {
        record,
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn estimate() -> PositionEstimate {
        PositionEstimate {
            x: 5.004321,
            y: 2.886751,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            confidence: 0.8,
            contributing_node_ids: vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")],
            distances: vec![1.995; 3],
        }
    }

    #[test]
    fn test_position_state() {
        let state = PositionFormatter::default().position_state(&estimate());

        assert_eq!(state.x, 5.0);
        assert_eq!(state.y, 2.89);
        assert_eq!(state.timestamp, "2026-03-01T12:30:00.000Z");
        assert_eq!(state.confidence, 0.8);
        assert_eq!(state.source, "csi_trilateration");
        assert_eq!(state.nodes.len(), 3);
    }

    #[test]
    fn test_tracker_attributes() {
        let tracker = PositionFormatter::default().tracker_attributes(&estimate());

        assert!((tracker.latitude - 0.02886751).abs() < 1e-12);
        assert!((tracker.longitude - 0.05004321).abs() < 1e-12);
        assert_eq!(tracker.gps_accuracy, 2.0);
        assert_eq!(tracker.source_type, "router");
    }

    #[test]
    fn test_json_shape() {
        let bytes = PositionFormatter::default().position_json(&estimate()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["source"], "csi_trilateration");
        assert_eq!(value["nodes"][2], "c");
        assert_eq!(value["timestamp"], "2026-03-01T12:30:00.000Z");
    }
}
