//! Edge types: plain edges live as adjacency in the builder; conditional
//! routing is a router function paired with a closed label map.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::state::StateSnapshot;
use crate::types::NodeId;

/// Routing decision function attached to a conditional edge.
///
/// Evaluated once per superstep per source node, on the post-merge snapshot.
/// The returned label is looked up in the edge's [`RouteMap`]; a label with
/// no mapping is a runtime error
/// ([`UnmappedRoutingLabel`](crate::engine::RunError::UnmappedRoutingLabel)).
pub type Router = Arc<dyn Fn(StateSnapshot) -> String + Send + Sync>;

/// Closed mapping from router labels to targets.
///
/// The label set is fixed when the graph is built; routers can only choose
/// among these targets, which keeps every possible transition visible to
/// compile-time reachability analysis.
#[derive(Clone, Debug, Default)]
pub struct RouteMap {
    targets: FxHashMap<String, NodeId>,
}

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `label` to a node.
    #[must_use]
    pub fn to_node(mut self, label: impl Into<String>, target: impl Into<NodeId>) -> Self {
        self.targets.insert(label.into(), target.into());
        self
    }

    /// Map `label` to the terminal marker, completing the run.
    #[must_use]
    pub fn to_end(mut self, label: impl Into<String>) -> Self {
        self.targets.insert(label.into(), NodeId::Terminal);
        self
    }

    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&NodeId> {
        self.targets.get(label)
    }

    pub fn targets(&self) -> impl Iterator<Item = &NodeId> {
        self.targets.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// A compiled conditional edge: one router plus its closed label map.
#[derive(Clone)]
pub struct ConditionalEdge {
    router: Router,
    routes: RouteMap,
}

impl ConditionalEdge {
    pub fn new(router: Router, routes: RouteMap) -> Self {
        Self { router, routes }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
