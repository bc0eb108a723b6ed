//! Result sinks
//!
//! Delivery is best effort and at most once: a failed publish is reported
//! to the caller, which logs it and moves on. Nothing is queued or retried.

use crate::core::PositionEstimate;
use crate::transport::error::SinkError;
use crate::transport::formatting::PositionFormatter;
use parking_lot::Mutex;
use tracing::info;

pub trait ResultSink: Send + Sync {
    fn publish(&self, estimate: &PositionEstimate) -> Result<(), SinkError>;
}

/// Keeps every published estimate in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<PositionEstimate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PositionEstimate> {
        self.published.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }

    pub fn take(&self) -> Vec<PositionEstimate> {
        std::mem::take(&mut *self.published.lock())
    }
}

impl ResultSink for MemorySink {
    fn publish(&self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        self.published.lock().push(estimate.clone());
        Ok(())
    }
}

/// Writes the position record to the log only
#[derive(Default)]
pub struct LogSink {
    formatter: PositionFormatter,
}

impl LogSink {
    pub fn new(formatter: PositionFormatter) -> Self {
        Self { formatter }
    }
}

impl ResultSink for LogSink {
    fn publish(&self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        let state = self.formatter.position_state(estimate);
        info!(
            x = state.x,
            y = state.y,
            confidence = state.confidence,
            timestamp = %state.timestamp,
            nodes = ?state.nodes,
            "Position"
        );
        Ok(())
    }
}
