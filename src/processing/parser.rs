use crate::core::{Measurement, NodeId, NodeStats};
use chrono::{DateTime, Utc};
use nalgebra::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data-channel payload as published by a sensing node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub timestamp: u64,
    pub rssi: f64,
    /// Raw CSI bytes, interleaved (imaginary, real) pairs
    #[serde(default)]
    pub csi_data: Vec<i8>,
    pub channel: u8,
    pub rate: u8,
}

/// Stats-channel heartbeat payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub packets: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub uptime: u64,
}

impl StatsPayload {
    pub fn into_stats(self, seen_at: DateTime<Utc>) -> NodeStats {
        NodeStats {
            packet_count: self.packets,
            enabled: self.enabled,
            uptime_s: self.uptime,
            last_seen: Some(seen_at),
        }
    }
}

/// Errors that can occur while decoding a node payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Invalid payload format: {details}")]
    InvalidFormat { details: String },
    #[error("Payload is not valid UTF-8")]
    InvalidEncoding,
    #[error("Unpaired channel sample data: {len} bytes")]
    UnpairedChannelData { len: usize },
}

/// Decoder turning raw transport payloads into typed records
pub struct MessageParser {
    strict_validation: bool,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        Self {
            strict_validation: true,
        }
    }

    /// When disabled, a trailing unpaired CSI byte is dropped instead of
    /// rejecting the whole measurement.
    pub fn set_strict_validation(&mut self, strict: bool) {
        self.strict_validation = strict;
    }

    /// Decode a data-channel payload into a measurement for `node_id`
    pub fn parse_measurement(
        &self,
        node_id: &NodeId,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Measurement, ParseError> {
        // serde_json has no NaN/Infinity literals and rejects overflowing
        // numbers, so a decoded `rssi` is always finite
        let data: DataPayload = decode_json(payload)?;
        let samples = self.channel_samples(&data.csi_data)?;

        Ok(Measurement::new(node_id.clone(), data.timestamp, data.rssi)
            .with_received_at(received_at)
            .with_channel_samples(samples)
            .with_radio(data.channel, data.rate))
    }

    /// Decode a stats-channel payload
    pub fn parse_stats(&self, payload: &[u8]) -> Result<StatsPayload, ParseError> {
        decode_json(payload)
    }

    fn channel_samples(&self, raw: &[i8]) -> Result<Vec<Complex<f32>>, ParseError> {
        if raw.len() % 2 != 0 && self.strict_validation {
            return Err(ParseError::UnpairedChannelData { len: raw.len() });
        }

        Ok(raw
            .chunks_exact(2)
            .map(|pair| Complex::new(pair[1] as f32, pair[0] as f32))
            .collect())
    }
}

fn decode_json<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::InvalidEncoding)?;
    serde_json::from_str(text).map_err(|e| ParseError::InvalidFormat {
        details: e.to_string(),
    })
}
