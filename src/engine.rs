//! The superstep interpreter.
//!
//! One call to [`run_superstep`] executes one barrier:
//!
//! 1. snapshot the current state;
//! 2. invoke every frontier member against that same snapshot (spawned
//!    tokio tasks when frontier parallelism is on, sequentially otherwise);
//! 3. buffer the returned partial updates;
//! 4. apply them in frontier order, each entry through its key's reducer;
//! 5. evaluate routers on the post-merge state and collect next-frontier
//!    targets, resolving failures through error edges.
//!
//! The barrier is atomic: a fatal failure discards every partial from the
//! step, leaving the state exactly as it was at the last completed barrier.

use futures_util::future::join_all;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::RunConfig;
use crate::events::EventEmitter;
use crate::graph::Plan;
use crate::node::{Node, NodeContext, NodeError};
use crate::state::{PartialUpdate, RunState, StateError, StateSnapshot};
use crate::types::NodeId;

/// Run-time failures. The run controller folds these into the final
/// [`RunOutcome`](crate::runner::RunOutcome); they never escape it.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    /// A node failed (or timed out) with no error edge registered.
    #[error("node {node} failed at superstep {step}: {source}")]
    #[diagnostic(code(stepweave::run::node_failed))]
    Node {
        node: NodeId,
        step: u64,
        #[source]
        source: NodeError,
    },

    /// A router produced a label absent from its route map, and the source
    /// had no error edge.
    #[error("router at {node} returned unmapped label {label:?} (superstep {step})")]
    #[diagnostic(
        code(stepweave::run::unmapped_label),
        help("Add the label to the RouteMap or register an error edge on the node.")
    )]
    UnmappedRoutingLabel {
        node: NodeId,
        label: String,
        step: u64,
    },

    /// A partial update was rejected during the barrier merge.
    #[error("state update from {node} rejected at superstep {step}: {source}")]
    #[diagnostic(code(stepweave::run::state))]
    State {
        node: NodeId,
        step: u64,
        #[source]
        source: StateError,
    },

    /// A frontier entry named a node the plan does not carry. Only possible
    /// when a run is resumed against a structurally different plan.
    #[error("no node registered for frontier entry {node} (superstep {step})")]
    #[diagnostic(
        code(stepweave::run::missing_node),
        help("Resumed runs must use a plan structurally equal to the one that was persisted.")
    )]
    MissingNode { node: NodeId, step: u64 },

    /// The run was cancelled between supersteps.
    #[error("run cancelled at superstep {step}")]
    #[diagnostic(code(stepweave::run::cancelled))]
    Cancelled { step: u64 },
}

/// What one barrier produced.
#[derive(Debug)]
pub(crate) struct SuperstepOutcome {
    /// Frontier members that ran, in frontier order.
    pub(crate) ran: Vec<NodeId>,
    /// The deduplicated frontier for the next superstep.
    pub(crate) next_frontier: Vec<NodeId>,
    /// A target resolved to the terminal marker; the run is complete.
    pub(crate) reached_terminal: bool,
}

/// Execute one superstep against `state`.
///
/// On success the post-merge state is committed in place. On error the state
/// is untouched unless routing itself failed, in which case the barrier
/// merge (all nodes succeeded) has already been committed.
pub(crate) async fn run_superstep(
    plan: &Plan,
    state: &mut RunState,
    frontier: &[NodeId],
    superstep: u64,
    config: &RunConfig,
    emitter: &EventEmitter,
) -> Result<SuperstepOutcome, RunError> {
    let snapshot = state.snapshot();

    let mut runnable: Vec<NodeId> = Vec::with_capacity(frontier.len());
    for id in frontier {
        if id.is_terminal() {
            tracing::warn!(step = superstep, "terminal marker in frontier; skipping");
            continue;
        }
        if !runnable.contains(id) {
            runnable.push(id.clone());
        }
    }

    tracing::debug!(step = superstep, nodes = runnable.len(), "invoking frontier");
    let results = invoke_frontier(plan, &runnable, &snapshot, superstep, config, emitter).await?;

    // Failures route through error edges or abort the step before any
    // partial is applied.
    let mut rerouted: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut partials: Vec<(NodeId, PartialUpdate)> = Vec::with_capacity(results.len());
    for (id, result) in runnable.iter().zip(results) {
        match result {
            Ok(partial) => partials.push((id.clone(), partial)),
            Err(error) => match plan.error_edge(id) {
                Some(target) => {
                    tracing::warn!(
                        node = %id,
                        target = %target,
                        %error,
                        "node failed; routing through error edge"
                    );
                    rerouted.insert(id.clone(), target.clone());
                }
                None => {
                    return Err(RunError::Node {
                        node: id.clone(),
                        step: superstep,
                        source: error,
                    });
                }
            },
        }
    }

    // Barrier merge on a scratch copy so a rejected write leaves the run at
    // its last completed barrier.
    let mut merged = state.clone();
    for (id, partial) in &partials {
        merged.apply_update(partial).map_err(|source| RunError::State {
            node: id.clone(),
            step: superstep,
            source,
        })?;
    }
    *state = merged;

    // Routing happens on the post-merge state, in frontier order. The first
    // terminal target wins; everything after it is dropped.
    let post = state.snapshot();
    let mut next_frontier: Vec<NodeId> = Vec::new();
    let mut reached_terminal = false;
    'routing: for id in &runnable {
        let targets = if let Some(error_target) = rerouted.get(id) {
            vec![error_target.clone()]
        } else {
            collect_targets(plan, id, &post, superstep)?
        };
        for target in targets {
            if target.is_terminal() {
                tracing::debug!(node = %id, step = superstep, "terminal marker reached");
                next_frontier.clear();
                reached_terminal = true;
                break 'routing;
            }
            if !next_frontier.contains(&target) {
                next_frontier.push(target);
            }
        }
    }

    Ok(SuperstepOutcome {
        ran: runnable,
        next_frontier,
        reached_terminal,
    })
}

/// Plain targets plus the router's choice, for one successful node.
fn collect_targets(
    plan: &Plan,
    id: &NodeId,
    post: &StateSnapshot,
    superstep: u64,
) -> Result<Vec<NodeId>, RunError> {
    let mut targets: Vec<NodeId> = plan.plain_targets(id).to_vec();
    if let Some(edge) = plan.router(id) {
        let label = (edge.router())(post.clone());
        match edge.routes().resolve(&label) {
            Some(target) => targets.push(target.clone()),
            None => match plan.error_edge(id) {
                Some(target) => {
                    tracing::warn!(
                        node = %id,
                        %label,
                        "unmapped routing label; routing through error edge"
                    );
                    targets.push(target.clone());
                }
                None => {
                    return Err(RunError::UnmappedRoutingLabel {
                        node: id.clone(),
                        label,
                        step: superstep,
                    });
                }
            },
        }
    }
    Ok(targets)
}

/// Invoke every runnable frontier member against the shared snapshot.
/// Results come back in frontier order regardless of completion order.
async fn invoke_frontier(
    plan: &Plan,
    runnable: &[NodeId],
    snapshot: &StateSnapshot,
    superstep: u64,
    config: &RunConfig,
    emitter: &EventEmitter,
) -> Result<Vec<Result<PartialUpdate, NodeError>>, RunError> {
    let mut nodes: Vec<Arc<dyn Node>> = Vec::with_capacity(runnable.len());
    for id in runnable {
        let node = plan.node(id).ok_or_else(|| RunError::MissingNode {
            node: id.clone(),
            step: superstep,
        })?;
        nodes.push(Arc::clone(node));
    }

    if config.parallelize_frontier && runnable.len() > 1 {
        let mut handles = Vec::with_capacity(runnable.len());
        for (id, node) in runnable.iter().zip(nodes) {
            let ctx = NodeContext {
                node_id: id.clone(),
                superstep,
                events: emitter.clone(),
            };
            let snap = snapshot.clone();
            let timeout = config.per_node_timeout;
            handles.push(tokio::spawn(async move {
                invoke_node(node, snap, ctx, timeout).await
            }));
        }
        let joined = join_all(handles).await;
        Ok(joined
            .into_iter()
            .map(|res| match res {
                Ok(result) => result,
                Err(join_error) => Err(NodeError::Failed(format!(
                    "node task aborted: {join_error}"
                ))),
            })
            .collect())
    } else {
        let mut results = Vec::with_capacity(runnable.len());
        for (id, node) in runnable.iter().zip(nodes) {
            let ctx = NodeContext {
                node_id: id.clone(),
                superstep,
                events: emitter.clone(),
            };
            results.push(invoke_node(node, snapshot.clone(), ctx, config.per_node_timeout).await);
        }
        Ok(results)
    }
}

async fn invoke_node(
    node: Arc<dyn Node>,
    snapshot: StateSnapshot,
    ctx: NodeContext,
    timeout: Option<Duration>,
) -> Result<PartialUpdate, NodeError> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, node.execute(snapshot, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                limit_ms: limit.as_millis() as u64,
            }),
        },
        None => node.execute(snapshot, ctx).await,
    }
}
