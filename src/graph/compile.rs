//! Graph validation and the compiled [`Plan`].
//!
//! `compile` checks the whole definition before anything runs: ids are
//! unique, every reference resolves, an entry exists, and (unless
//! [`allow_unbounded`](super::GraphBuilder::allow_unbounded) was called)
//! every entry-reachable node can reach the terminal marker under at least
//! one routing choice. Reachability walks the union of plain edges, all
//! route-map targets, and error edges.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use super::builder::GraphBuilder;
use super::plan::Plan;
use crate::types::NodeId;

/// Structural errors reported by [`GraphBuilder::compile`].
#[derive(Debug, Error, Diagnostic)]
pub enum GraphCompileError {
    #[error("duplicate node id: {id}")]
    #[diagnostic(
        code(stepweave::graph::duplicate_node),
        help("Each node id may be registered at most once.")
    )]
    DuplicateNodeId { id: NodeId },

    #[error("unknown node reference: {id} ({context})")]
    #[diagnostic(
        code(stepweave::graph::unknown_reference),
        help("Register the node with add_node before referencing it.")
    )]
    UnknownNodeReference { id: NodeId, context: &'static str },

    #[error("no entry node set")]
    #[diagnostic(
        code(stepweave::graph::entry_undefined),
        help("Call set_entry before compiling.")
    )]
    EntryUndefined,

    #[error("node {id} cannot reach the terminal marker")]
    #[diagnostic(
        code(stepweave::graph::unreachable_terminal),
        help(
            "Add an edge or route leading to the terminal marker, or call \
             allow_unbounded() to rely on the superstep budget."
        )
    )]
    UnreachableTerminal { id: NodeId },
}

impl GraphBuilder {
    /// Validate the definition and freeze it into an immutable [`Plan`].
    pub fn compile(self) -> Result<Plan, GraphCompileError> {
        if let Some(id) = self.duplicates.into_iter().next() {
            return Err(GraphCompileError::DuplicateNodeId { id });
        }

        let entry = self.entry.ok_or(GraphCompileError::EntryUndefined)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphCompileError::UnknownNodeReference {
                id: entry,
                context: "entry node",
            });
        }

        for (from, targets) in &self.edges {
            check_source(&self.nodes, from, "edge source")?;
            for to in targets {
                check_target(&self.nodes, to, "edge target")?;
            }
        }
        for (from, edge) in &self.conditional {
            check_source(&self.nodes, from, "conditional edge source")?;
            for to in edge.routes().targets() {
                check_target(&self.nodes, to, "route target")?;
            }
        }
        for (from, to) in &self.error_edges {
            check_source(&self.nodes, from, "error edge source")?;
            check_target(&self.nodes, to, "error edge target")?;
        }

        let successors = |id: &NodeId| -> Vec<NodeId> {
            let mut out: Vec<NodeId> = Vec::new();
            if let Some(targets) = self.edges.get(id) {
                out.extend(targets.iter().cloned());
            }
            if let Some(edge) = self.conditional.get(id) {
                out.extend(edge.routes().targets().cloned());
            }
            if let Some(target) = self.error_edges.get(id) {
                out.push(target.clone());
            }
            out
        };

        // Forward reachability from the entry, in BFS discovery order.
        let mut reachable: FxHashSet<NodeId> = FxHashSet::default();
        let mut discovered: Vec<NodeId> = Vec::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        reachable.insert(entry.clone());
        discovered.push(entry.clone());
        queue.push_back(entry.clone());
        while let Some(current) = queue.pop_front() {
            if current.is_terminal() {
                continue;
            }
            for next in successors(&current) {
                if reachable.insert(next.clone()) {
                    discovered.push(next.clone());
                    queue.push_back(next);
                }
            }
        }

        for id in self.nodes.keys() {
            if !reachable.contains(id) {
                tracing::warn!(node = %id, "node is unreachable from the entry and will never run");
            }
        }

        if !self.unbounded_allowed {
            // Reverse reachability from the terminal marker: a node survives
            // when at least one choice at each step can lead to termination.
            let mut reverse: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
            for from in self.nodes.keys() {
                for to in successors(from) {
                    reverse.entry(to).or_default().push(from.clone());
                }
            }
            let mut can_finish: FxHashSet<NodeId> = FxHashSet::default();
            let mut queue: VecDeque<NodeId> = VecDeque::new();
            can_finish.insert(NodeId::Terminal);
            queue.push_back(NodeId::Terminal);
            while let Some(current) = queue.pop_front() {
                if let Some(sources) = reverse.get(&current) {
                    for from in sources {
                        if can_finish.insert(from.clone()) {
                            queue.push_back(from.clone());
                        }
                    }
                }
            }
            for id in &discovered {
                if !id.is_terminal() && !can_finish.contains(id) {
                    return Err(GraphCompileError::UnreachableTerminal { id: id.clone() });
                }
            }
        }

        Ok(Plan::from_parts(
            self.nodes,
            entry,
            self.edges,
            self.conditional,
            self.error_edges,
            reachable,
        ))
    }
}

fn check_source(
    nodes: &FxHashMap<NodeId, Arc<dyn crate::node::Node>>,
    id: &NodeId,
    context: &'static str,
) -> Result<(), GraphCompileError> {
    // The terminal marker never has outgoing edges of any kind.
    if id.is_terminal() || !nodes.contains_key(id) {
        return Err(GraphCompileError::UnknownNodeReference {
            id: id.clone(),
            context,
        });
    }
    Ok(())
}

fn check_target(
    nodes: &FxHashMap<NodeId, Arc<dyn crate::node::Node>>,
    id: &NodeId,
    context: &'static str,
) -> Result<(), GraphCompileError> {
    if !id.is_terminal() && !nodes.contains_key(id) {
        return Err(GraphCompileError::UnknownNodeReference {
            id: id.clone(),
            context,
        });
    }
    Ok(())
}
