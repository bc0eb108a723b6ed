//! CSI Position Fusion
//!
//! Fuses per-node signal strength measurements streamed by fixed sensing
//! nodes into a single 2D position estimate by range-based trilateration,
//! and publishes the result downstream.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod fusion;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use core::{Measurement, NodeId, NodeStats, PositionEstimate, RangedAnchor};
pub use algorithms::TrilaterationSolver;
pub use processing::{MeasurementBuffer, MessageParser, ParseError, PathLossModel};
pub use fusion::{CycleOutcome, FusionOrchestrator, FusionState, NodeRegistry, SharedOrchestrator};
pub use transport::{IngestRouter, MemorySink, ResultSink, RouteOutcome, SinkError};
pub use utils::{init_logging, ConfigError, FusionConfig, LogLevel};
