//! The node contract: the single trait user workflows implement.
//!
//! A node is a pure-ish async step: it receives a read-only snapshot of run
//! state plus an execution context and returns a [`PartialUpdate`] describing
//! the writes it wants merged. Nodes never mutate state directly and never
//! decide routing; both belong to the engine.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::events::EventEmitter;
use crate::state::{PartialUpdate, StateSnapshot};
use crate::types::NodeId;

/// Errors a node invocation can produce.
///
/// Any of these routes through the node's error edge when one is registered,
/// and otherwise fails the run.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Generic application-level failure.
    #[error("node failed: {0}")]
    #[diagnostic(code(stepweave::node::failed))]
    Failed(String),

    /// The snapshot lacked an input the node requires.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stepweave::node::missing_input),
        help("Seed the key in the initial state or have an upstream node write it.")
    )]
    MissingInput { what: &'static str },

    /// The invocation exceeded the configured per-node timeout.
    #[error("node timed out after {limit_ms} ms")]
    #[diagnostic(code(stepweave::node::timeout))]
    Timeout { limit_ms: u64 },

    /// JSON (de)serialization failed inside the node.
    #[error("serialization error: {0}")]
    #[diagnostic(code(stepweave::node::serde))]
    Serde(#[from] serde_json::Error),
}

/// Per-invocation context handed to a node alongside its snapshot.
#[derive(Clone)]
pub struct NodeContext {
    /// The id this invocation runs as.
    pub node_id: NodeId,
    /// The 1-based superstep being executed.
    pub superstep: u64,
    pub(crate) events: EventEmitter,
}

impl NodeContext {
    /// Emit a scoped observability message. Best effort; a missing or
    /// disconnected sink drops the message without failing the node.
    pub fn emit(&self, scope: impl Into<String>, message: impl Into<String>) {
        self.events
            .emit_node(self.node_id.clone(), self.superstep, scope, message);
    }
}

/// An executable workflow step.
///
/// Implementations must be `Send + Sync`: with frontier parallelism enabled
/// the engine invokes nodes from spawned tasks, all sharing the same
/// pre-superstep snapshot.
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::json;
/// use stepweave::node::{Node, NodeContext, NodeError};
/// use stepweave::state::{PartialUpdate, StateSnapshot};
///
/// struct Greeter;
///
/// #[async_trait]
/// impl Node for Greeter {
///     async fn execute(
///         &self,
///         snapshot: StateSnapshot,
///         ctx: NodeContext,
///     ) -> Result<PartialUpdate, NodeError> {
///         let name = snapshot
///             .get_str("name")
///             .ok_or(NodeError::MissingInput { what: "name" })?;
///         ctx.emit("greeting", format!("greeting {name}"));
///         Ok(PartialUpdate::new().set("message", json!(format!("hello, {name}"))))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<PartialUpdate, NodeError>;
}
