//! # stepweave
//!
//! A superstep-driven execution engine for stateful workflow graphs.
//!
//! A workflow is a directed graph of async [`Node`]s sharing a typed-by-key
//! state. Execution proceeds in barriers (supersteps): every node in the
//! current frontier reads the same pre-step [`StateSnapshot`], their
//! [`PartialUpdate`]s are merged in deterministic frontier order through
//! per-key [`Reducer`]s, and routing is decided on the post-merge state.
//! Runs always terminate: graphs are validated for terminal reachability at
//! compile time, and budgets cap supersteps and wall-clock time at run time.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepweave::{
//!     GraphBuilder, RouteMap, RunController, RunState, RunStatus, StateSchema, StateSnapshot,
//! };
//! use stepweave::testing::SetKeyNode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Arc::new(
//!     StateSchema::builder()
//!         .overwrite("data", json!(""))
//!         .overwrite("processed", json!(false))
//!         .build(),
//! );
//!
//! let plan = GraphBuilder::new()
//!     .add_node("load", SetKeyNode::new("data", json!("raw")))
//!     .add_node("process", SetKeyNode::new("processed", json!(true)))
//!     .add_edge("load", "process")
//!     .add_conditional_edge(
//!         "process",
//!         Arc::new(|snap: StateSnapshot| {
//!             if snap.get_bool("processed").unwrap_or(false) {
//!                 "complete".to_string()
//!             } else {
//!                 "retry".to_string()
//!             }
//!         }),
//!         RouteMap::new().to_end("complete").to_node("retry", "process"),
//!     )
//!     .set_entry("load")
//!     .compile()?;
//!
//! let outcome = RunController::new(plan).start(RunState::new(schema)).await;
//! assert_eq!(outcome.status, RunStatus::Completed);
//! assert_eq!(outcome.supersteps, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module map
//!
//! - [`schema`] / [`state`]: declared keys, reducers, run state, snapshots.
//! - [`node`]: the [`Node`] trait workflows implement.
//! - [`graph`]: builder, edges, routers, compile-time validation, [`Plan`].
//! - [`engine`]: the superstep interpreter and [`RunError`].
//! - [`runner`]: [`RunController`] with start / resume / stream / cancel.
//! - [`persistence`]: [`PersistedRun`] checkpoints.
//! - [`events`] / [`telemetry`]: observability.
//! - [`testing`]: stock nodes for test suites.

pub mod config;
pub mod engine;
pub mod events;
pub mod graph;
pub mod node;
pub mod persistence;
pub mod runner;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod testing;
pub mod types;

pub use config::{RunConfig, DEFAULT_MAX_SUPERSTEPS};
pub use engine::RunError;
pub use events::{EventEmitter, RunEvent};
pub use graph::{ConditionalEdge, GraphBuilder, GraphCompileError, Plan, RouteMap, Router};
pub use node::{Node, NodeContext, NodeError};
pub use persistence::{PersistedRun, PersistenceError};
pub use runner::{
    BudgetKind, CancelHandle, CancelSignal, RunController, RunOutcome, RunStatus, StepSnapshot,
    StreamHandle,
};
pub use schema::{
    AppendSequence, IncrementCounter, Overwrite, Reducer, SchemaBuilder, StateSchema, UnionSet,
};
pub use state::{PartialUpdate, RunState, StateError, StateSnapshot};
pub use types::NodeId;
