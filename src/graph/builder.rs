//! Fluent, infallible graph construction. All validation happens in
//! [`compile`](GraphBuilder::compile).

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, RouteMap, Router};
use crate::node::Node;
use crate::types::NodeId;

/// Mutable definition of a workflow graph.
///
/// Nodes, edges and the entry point are accumulated freely; structural
/// problems (duplicates, dangling references, unreachable termination) are
/// reported together by [`compile`](Self::compile).
///
/// ```rust
/// use std::sync::Arc;
/// use serde_json::json;
/// use stepweave::graph::{GraphBuilder, RouteMap};
/// use stepweave::testing::SetKeyNode;
///
/// let plan = GraphBuilder::new()
///     .add_node("work", SetKeyNode::new("done", json!(true)))
///     .add_conditional_edge(
///         "work",
///         Arc::new(|snap: stepweave::state::StateSnapshot| {
///             if snap.get_bool("done").unwrap_or(false) { "finish" } else { "again" }.to_string()
///         }),
///         RouteMap::new().to_end("finish").to_node("again", "work"),
///     )
///     .set_entry("work")
///     .compile()
///     .unwrap();
/// assert!(plan.is_reachable(&"work".into()));
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    pub(super) nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    pub(super) duplicates: Vec<NodeId>,
    pub(super) edges: FxHashMap<NodeId, Vec<NodeId>>,
    pub(super) conditional: FxHashMap<NodeId, ConditionalEdge>,
    pub(super) error_edges: FxHashMap<NodeId, NodeId>,
    pub(super) entry: Option<NodeId>,
    pub(super) unbounded_allowed: bool,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under `id`.
    ///
    /// Registering under the terminal marker is ignored with a warning; a
    /// repeated id is recorded and reported by `compile` as
    /// [`DuplicateNodeId`](super::GraphCompileError::DuplicateNodeId).
    #[must_use]
    pub fn add_node(mut self, id: impl Into<NodeId>, node: impl Node + 'static) -> Self {
        let id = id.into();
        if id.is_terminal() {
            tracing::warn!("the terminal marker cannot carry a node implementation; ignoring");
            return self;
        }
        if self.nodes.contains_key(&id) {
            self.duplicates.push(id);
            return self;
        }
        self.nodes.insert(id, Arc::new(node));
        self
    }

    /// Add an unconditional edge. `to` may be the terminal marker.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Attach a conditional edge to `from`.
    ///
    /// A source holds at most one router; attaching a second replaces the
    /// first with a warning.
    #[must_use]
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<NodeId>,
        router: Router,
        routes: RouteMap,
    ) -> Self {
        let from = from.into();
        if self
            .conditional
            .insert(from.clone(), ConditionalEdge::new(router, routes))
            .is_some()
        {
            tracing::warn!(node = %from, "replacing previously registered router");
        }
        self
    }

    /// Register an error edge: when `from` fails, activate `to` next
    /// superstep instead of failing the run. `to` may be the terminal
    /// marker, or `from` itself for a retry loop.
    #[must_use]
    pub fn add_error_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        let from = from.into();
        if self.error_edges.insert(from.clone(), to.into()).is_some() {
            tracing::warn!(node = %from, "replacing previously registered error edge");
        }
        self
    }

    /// Designate the node activated in superstep 1.
    #[must_use]
    pub fn set_entry(mut self, id: impl Into<NodeId>) -> Self {
        self.entry = Some(id.into());
        self
    }

    /// Opt out of the terminal-reachability check, for graphs whose
    /// termination relies solely on the superstep budget.
    #[must_use]
    pub fn allow_unbounded(mut self) -> Self {
        self.unbounded_allowed = true;
        self
    }
}
