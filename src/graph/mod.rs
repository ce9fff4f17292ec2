//! Graph definition and compilation.
//!
//! Workflows are declared with [`GraphBuilder`] (nodes, plain edges,
//! conditional edges with closed [`RouteMap`]s, error edges, an entry point)
//! and frozen by [`GraphBuilder::compile`] into an immutable [`Plan`] the
//! engine executes. All structural validation happens at compile time.

mod builder;
mod compile;
mod edges;
mod plan;

pub use builder::GraphBuilder;
pub use compile::GraphCompileError;
pub use edges::{ConditionalEdge, RouteMap, Router};
pub use plan::Plan;
