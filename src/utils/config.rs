use crate::core::{
    NodeId, DEFAULT_BUFFER_CAPACITY, DEFAULT_COLLINEARITY_TOLERANCE, DEFAULT_CONFIDENCE, QUORUM,
};
use crate::processing::PathLossModel;
use crate::utils::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Complete service configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,
    /// Fixed node positions, in selection order
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub fusion: FusionSettings,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Broker connection and subscription settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_s: u64,
    /// Node topics are `<topic_root>/<node_id>/data|stats`
    pub topic_root: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "csi-fusion".to_string(),
            keep_alive_s: 60,
            topic_root: "whofi/csi".to_string(),
        }
    }
}

/// Static position of one sensing node (meters, local frame)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

/// When fusion cycles run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerMode {
    /// One cycle after every ingested data sample
    #[default]
    PerMeasurement,
    /// One cycle per timer tick
    Interval { period_ms: u64 },
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub buffer_capacity: usize,
    pub path_loss: PathLossModel,
    /// Confidence attached to every estimate
    pub confidence: f64,
    pub collinearity_tolerance: f64,
    /// Nodes without data for longer than this stop qualifying.
    /// `None` keeps every node that ever reported qualifying forever.
    pub stale_after_ms: Option<u64>,
    pub trigger: TriggerMode,
    /// Reject measurements whose `csi_data` has an unpaired trailing byte.
    /// When false the byte is dropped and the measurement kept.
    pub strict_csi: bool,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            path_loss: PathLossModel::default(),
            confidence: DEFAULT_CONFIDENCE,
            collinearity_tolerance: DEFAULT_COLLINEARITY_TOLERANCE,
            stale_after_ms: None,
            trigger: TriggerMode::default(),
            strict_csi: true,
        }
    }
}

/// Downstream publication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub position_topic: String,
    pub tracker_topic: String,
    pub source_tag: String,
    /// Publish the geographic tracker record alongside the raw position
    pub publish_tracker: bool,
    /// Local meters per geographic degree
    pub geo_scale: f64,
    pub gps_accuracy: f64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            position_topic: "homeassistant/sensor/whofi_position/state".to_string(),
            tracker_topic: "homeassistant/device_tracker/whofi_tracker/attributes".to_string(),
            source_tag: "csi_trilateration".to_string(),
            publish_tracker: true,
            geo_scale: 100.0,
            gps_accuracy: 2.0,
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("Node {node_id} is configured more than once")]
    DuplicateNode { node_id: NodeId },
    #[error("I/O error: {message}")]
    IoError { message: String },
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl FusionConfig {
    /// Configuration with default settings for the given nodes
    pub fn with_nodes(nodes: Vec<NodeConfig>) -> Self {
        Self {
            mqtt: MqttConfig::default(),
            nodes,
            fusion: FusionSettings::default(),
            publish: PublishConfig::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        Self::from_json(&content).map_err(|e| match e {
            ConfigError::SerializationError { message } => ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, message),
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: FusionConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::SerializationError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(ConfigError::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(invalid(
                    "nodes",
                    format!("{} ({}, {})", node.id, node.x, node.y),
                    "Node coordinates must be finite",
                ));
            }
        }

        let fusion = &self.fusion;
        if fusion.buffer_capacity == 0 {
            return Err(invalid("fusion.buffer_capacity", 0, "Capacity must be at least 1"));
        }
        if fusion.path_loss.window == 0 {
            return Err(invalid("fusion.path_loss.window", 0, "Window must be at least 1"));
        }
        if !(fusion.path_loss.exponent.is_finite() && fusion.path_loss.exponent > 0.0) {
            return Err(invalid(
                "fusion.path_loss.exponent",
                fusion.path_loss.exponent,
                "Path-loss exponent must be positive",
            ));
        }
        if !fusion.path_loss.reference_db.is_finite() {
            return Err(invalid(
                "fusion.path_loss.reference_db",
                fusion.path_loss.reference_db,
                "Reference signal strength must be finite",
            ));
        }
        if !(0.0..=1.0).contains(&fusion.confidence) {
            return Err(invalid("fusion.confidence", fusion.confidence, "Confidence must be in [0, 1]"));
        }
        if !(fusion.collinearity_tolerance >= 0.0) {
            return Err(invalid(
                "fusion.collinearity_tolerance",
                fusion.collinearity_tolerance,
                "Tolerance must be non-negative",
            ));
        }
        if fusion.stale_after_ms == Some(0) {
            return Err(invalid("fusion.stale_after_ms", 0, "Use null to disable the staleness cutoff"));
        }
        if let TriggerMode::Interval { period_ms: 0 } = fusion.trigger {
            return Err(invalid("fusion.trigger.period_ms", 0, "Timer period must be positive"));
        }

        if !(self.publish.geo_scale.is_finite() && self.publish.geo_scale != 0.0) {
            return Err(invalid("publish.geo_scale", self.publish.geo_scale, "Scale must be finite and non-zero"));
        }
        if self.mqtt.topic_root.is_empty() {
            return Err(invalid("mqtt.topic_root", "", "Topic root must not be empty"));
        }

        Ok(())
    }

    /// Problems that do not prevent startup but will limit positioning
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.nodes.len() < QUORUM {
            warnings.push(format!(
                "Only {} node(s) configured, at least {} are needed for a position",
                self.nodes.len(),
                QUORUM
            ));
        }

        if let [a, b, c, ..] = self.nodes.as_slice() {
            let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            if cross.abs() < 1e-9 {
                warnings.push(format!(
                    "Nodes {}, {} and {} are collinear; solves over them will always fail",
                    a.id, b.id, c.id
                ));
            }
        }

        if let Some(ms) = self.fusion.stale_after_ms {
            if let TriggerMode::Interval { period_ms } = self.fusion.trigger {
                if ms < period_ms {
                    warnings.push(format!(
                        "Staleness cutoff {}ms is shorter than the {}ms solve period",
                        ms, period_ms
                    ));
                }
            }
        }

        warnings
    }
}
