//! Static node positions

use crate::core::NodeId;
use crate::utils::config::{ConfigError, NodeConfig};
use nalgebra::Point2;
use std::collections::HashMap;

/// Read-only map of node identity to fixed position.
///
/// Iteration follows declaration order, which is also the anchor selection
/// order used by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    entries: Vec<(NodeId, Point2<f64>)>,
    index: HashMap<NodeId, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration; duplicate ids are rejected
    pub fn from_config(nodes: &[NodeConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for node in nodes {
            registry.insert(node.id.clone(), Point2::new(node.x, node.y))?;
        }
        Ok(registry)
    }

    fn insert(&mut self, id: NodeId, position: Point2<f64>) -> Result<(), ConfigError> {
        if self.index.contains_key(&id) {
            return Err(ConfigError::DuplicateNode { node_id: id });
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, position));
        Ok(())
    }

    pub fn position_of(&self, id: &NodeId) -> Option<Point2<f64>> {
        self.index.get(id).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, Point2<f64>)> + '_ {
        self.entries.iter().map(|(id, p)| (id, *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
