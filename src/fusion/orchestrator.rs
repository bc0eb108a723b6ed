//! Quorum policy and fusion cycle driver
//!
//! The orchestrator owns every [`NodeState`] and decides, per cycle, whether
//! enough nodes have data to trilaterate. It never publishes anything
//! itself: a successful cycle returns the estimate and the caller hands it
//! to a sink, so publishing happens outside whatever lock guards this type.

use crate::algorithms::TrilaterationSolver;
use crate::core::{Measurement, NodeId, NodeStats, PositionEstimate, RangedAnchor, QUORUM};
use crate::fusion::node::NodeState;
use crate::fusion::registry::NodeRegistry;
use crate::processing::PathLossModel;
use crate::utils::config::FusionSettings;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Quorum state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionState {
    /// Fewer than three registered nodes with data
    Waiting,
    /// At least three registered nodes with data
    Ready,
}

/// What a single fusion cycle produced
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Quorum not met; nothing was solved
    Waiting { qualifying: usize },
    /// The selected anchors were collinear or coincident
    Degenerate { nodes: Vec<NodeId> },
    Solved(PositionEstimate),
}

impl CycleOutcome {
    pub fn estimate(&self) -> Option<&PositionEstimate> {
        match self {
            CycleOutcome::Solved(estimate) => Some(estimate),
            _ => None,
        }
    }

    pub fn into_estimate(self) -> Option<PositionEstimate> {
        match self {
            CycleOutcome::Solved(estimate) => Some(estimate),
            _ => None,
        }
    }
}

/// Running totals since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionCounters {
    pub measurements: u64,
    pub stats_updates: u64,
    pub cycles: u64,
    pub solved: u64,
    pub degenerate: u64,
    pub waiting: u64,
}

pub struct FusionOrchestrator {
    registry: Arc<NodeRegistry>,
    nodes: HashMap<NodeId, NodeState>,
    estimator: PathLossModel,
    solver: TrilaterationSolver,
    confidence: f64,
    buffer_capacity: usize,
    stale_after: Option<Duration>,
    state: FusionState,
    counters: FusionCounters,
}

impl FusionOrchestrator {
    pub fn new(registry: Arc<NodeRegistry>, settings: &FusionSettings) -> Self {
        Self {
            registry,
            nodes: HashMap::new(),
            estimator: settings.path_loss,
            solver: TrilaterationSolver::with_tolerance(settings.collinearity_tolerance),
            confidence: settings.confidence.clamp(0.0, 1.0),
            buffer_capacity: settings.buffer_capacity,
            stale_after: settings
                .stale_after_ms
                .map(|ms| Duration::milliseconds(ms.min(i64::MAX as u64) as i64)),
            state: FusionState::Waiting,
            counters: FusionCounters::default(),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn state(&self) -> FusionState {
        self.state
    }

    pub fn counters(&self) -> FusionCounters {
        self.counters
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Append a decoded data sample to its node's buffer
    pub fn ingest_measurement(&mut self, measurement: Measurement) -> FusionState {
        let now = measurement.received_at;
        self.node_entry(&measurement.node_id).record(measurement);
        self.counters.measurements += 1;
        self.refresh_state(now)
    }

    /// Replace a node's heartbeat statistics. Never touches its buffer.
    pub fn update_stats(&mut self, node_id: &NodeId, stats: NodeStats) {
        debug!(
            node = %node_id,
            packets = stats.packet_count,
            enabled = stats.enabled,
            uptime_s = stats.uptime_s,
            "Node stats updated"
        );
        self.node_entry(node_id).stats = stats;
        self.counters.stats_updates += 1;
    }

    /// Run one fusion cycle against the current wall clock
    pub fn attempt_solve(&mut self) -> CycleOutcome {
        self.attempt_solve_at(Utc::now())
    }

    /// Run one fusion cycle as of `now`
    pub fn attempt_solve_at(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        self.counters.cycles += 1;
        self.refresh_state(now);

        let selected: Vec<(NodeId, RangedAnchor)> = self
            .qualifying_nodes(now)
            .into_iter()
            .filter_map(|(id, position)| {
                let state = self.nodes.get(id)?;
                let distance = self.estimator.estimate_distance(&state.buffer)?;
                Some((id.clone(), RangedAnchor::new(position, distance)))
            })
            .take(QUORUM)
            .collect();

        let anchors: [RangedAnchor; QUORUM] = match selected.as_slice() {
            [(_, a), (_, b), (_, c)] => [*a, *b, *c],
            _ => {
                self.counters.waiting += 1;
                return CycleOutcome::Waiting {
                    qualifying: selected.len(),
                };
            }
        };
        let (ids, anchors_used): (Vec<NodeId>, Vec<RangedAnchor>) = selected.into_iter().unzip();

        let Some(position) = self.solver.solve(&anchors) else {
            self.counters.degenerate += 1;
            debug!(nodes = ?ids, "Degenerate anchor geometry, skipping cycle");
            return CycleOutcome::Degenerate { nodes: ids };
        };

        self.counters.solved += 1;
        let estimate = PositionEstimate {
            x: position.x,
            y: position.y,
            timestamp: now,
            confidence: self.confidence,
            contributing_node_ids: ids,
            distances: anchors_used.iter().map(|a| a.distance).collect(),
        };
        debug!(x = estimate.x, y = estimate.y, nodes = ?estimate.contributing_node_ids, "Position solved");

        CycleOutcome::Solved(estimate)
    }

    /// Registered nodes that can take part in a solve at `now`, in registry order
    pub fn qualifying_nodes(&self, now: DateTime<Utc>) -> Vec<(&NodeId, nalgebra::Point2<f64>)> {
        self.registry
            .iter()
            .filter(|(id, _)| {
                self.nodes
                    .get(*id)
                    .is_some_and(|state| state.has_fresh_data(now, self.stale_after))
            })
            .collect()
    }

    fn node_entry(&mut self, id: &NodeId) -> &mut NodeState {
        let registry = &self.registry;
        let capacity = self.buffer_capacity;
        self.nodes.entry(id.clone()).or_insert_with(|| {
            let registered = registry.contains(id);
            if registered {
                info!(node = %id, "First message from node");
            } else {
                warn!(node = %id, "Node has no configured position and will never contribute");
            }
            NodeState::new(id.clone(), capacity, registered)
        })
    }

    fn refresh_state(&mut self, now: DateTime<Utc>) -> FusionState {
        let sticky = self.stale_after.is_none() && self.state == FusionState::Ready;
        let next = if sticky || self.qualifying_nodes(now).len() >= QUORUM {
            FusionState::Ready
        } else {
            FusionState::Waiting
        };

        if next != self.state {
            info!(from = ?self.state, to = ?next, "Fusion state changed");
            self.state = next;
        }
        self.state
    }
}
