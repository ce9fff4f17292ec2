//! The immutable execution plan produced by a successful compile.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

use super::edges::ConditionalEdge;
use crate::node::Node;
use crate::types::NodeId;

/// A validated, frozen workflow graph.
///
/// Holds the node registry, adjacency, compiled routers, error edges and the
/// entry-reachable set. Mutation after compile is impossible; a plan can be
/// shared across concurrent runs.
#[derive(Clone)]
pub struct Plan {
    nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    entry: NodeId,
    adjacency: FxHashMap<NodeId, Vec<NodeId>>,
    routers: FxHashMap<NodeId, ConditionalEdge>,
    error_edges: FxHashMap<NodeId, NodeId>,
    reachable: FxHashSet<NodeId>,
}

impl Plan {
    pub(super) fn from_parts(
        nodes: FxHashMap<NodeId, Arc<dyn Node>>,
        entry: NodeId,
        adjacency: FxHashMap<NodeId, Vec<NodeId>>,
        routers: FxHashMap<NodeId, ConditionalEdge>,
        error_edges: FxHashMap<NodeId, NodeId>,
        reachable: FxHashSet<NodeId>,
    ) -> Self {
        Self {
            nodes,
            entry,
            adjacency,
            routers,
            error_edges,
            reachable,
        }
    }

    pub fn entry(&self) -> &NodeId {
        &self.entry
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    /// Unconditional targets of `id`, in registration order.
    pub fn plain_targets(&self, id: &NodeId) -> &[NodeId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn router(&self, id: &NodeId) -> Option<&ConditionalEdge> {
        self.routers.get(id)
    }

    pub fn error_edge(&self, id: &NodeId) -> Option<&NodeId> {
        self.error_edges.get(id)
    }

    /// Whether `id` is reachable from the entry node.
    #[must_use]
    pub fn is_reachable(&self, id: &NodeId) -> bool {
        self.reachable.contains(id)
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.len())
            .field("routers", &self.routers.len())
            .field("error_edges", &self.error_edges.len())
            .finish()
    }
}
