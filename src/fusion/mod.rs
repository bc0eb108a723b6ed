//! Node registry, per-node state and the fusion cycle

pub mod node;
pub mod orchestrator;
pub mod registry;

pub use node::NodeState;
pub use orchestrator::{CycleOutcome, FusionCounters, FusionOrchestrator, FusionState};
pub use registry::NodeRegistry;

use parking_lot::Mutex;
use std::sync::Arc;

/// The single coarse lock shared by every ingest and solve path
pub type SharedOrchestrator = Arc<Mutex<FusionOrchestrator>>;
