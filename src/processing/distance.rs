//! Signal-strength to range conversion
//!
//! Log-distance path-loss model:
//!
//! ```text
//! d = 10 ^ ((A - avg_rssi) / (10 * n))
//! ```
//!
//! with `A` the signal strength at 1 m and `n` the path-loss exponent. The
//! defaults (A = -30 dB, n = 2.0) assume free-space decay, which indoor
//! multipath routinely violates; the resulting range error is accepted and
//! flows straight into the position estimate.

use crate::core::{DISTANCE_WINDOW, PATH_LOSS_EXPONENT, REFERENCE_SIGNAL_DB};
use crate::processing::buffer::MeasurementBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossModel {
    /// Signal strength at the 1 m reference distance (dB)
    pub reference_db: f64,
    /// Path-loss exponent
    pub exponent: f64,
    /// Number of most recent measurements averaged
    pub window: usize,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            reference_db: REFERENCE_SIGNAL_DB,
            exponent: PATH_LOSS_EXPONENT,
            window: DISTANCE_WINDOW,
        }
    }
}

impl PathLossModel {
    pub fn new(reference_db: f64, exponent: f64, window: usize) -> Self {
        Self {
            reference_db,
            exponent,
            window,
        }
    }

    /// Estimated range (m) from the node owning `buffer` to the target.
    /// `None` when the buffer holds nothing.
    pub fn estimate_distance(&self, buffer: &MeasurementBuffer) -> Option<f64> {
        let (sum, count) = buffer
            .recent(self.window)
            .fold((0.0, 0usize), |(sum, count), m| (sum + m.signal_strength, count + 1));

        if count == 0 {
            return None;
        }

        Some(self.distance_for(sum / count as f64))
    }

    /// Range (m) for a single averaged signal strength
    pub fn distance_for(&self, signal_db: f64) -> f64 {
        10f64.powf((self.reference_db - signal_db) / (10.0 * self.exponent))
    }
}
