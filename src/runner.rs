//! The run controller: the single failure boundary around the engine.
//!
//! A controller owns a compiled [`Plan`] plus a [`RunConfig`] and drives
//! supersteps until the run completes, fails, or exhausts a budget. Every
//! run-time failure is folded into the returned [`RunOutcome`]; nothing
//! panics and no error escapes past [`start`](RunController::start),
//! [`resume`](RunController::resume) or [`stream`](RunController::stream)
//! (resume can still reject a malformed checkpoint before any superstep
//! runs).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::engine::{self, RunError};
use crate::events::{EventEmitter, RunEvent};
use crate::graph::Plan;
use crate::persistence::{PersistedRun, PersistenceError};
use crate::schema::StateSchema;
use crate::state::{RunState, StateSnapshot};
use crate::types::NodeId;

/// Lifecycle status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Supersteps are still being executed (only ever observed in a
    /// persisted checkpoint).
    Running,
    /// Routing reached the terminal marker, or the frontier emptied.
    Completed,
    /// A fatal error stopped the run; see [`RunOutcome::error`].
    Failed,
    /// A budget cut the run off; see [`RunOutcome::budget`].
    BudgetExceeded,
}

/// Which budget stopped a `BudgetExceeded` run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetKind {
    Supersteps,
    WallClock,
}

/// Everything a finished (or cut-off) run leaves behind.
///
/// The state is the last good state: post-merge of the final completed
/// barrier. A `BudgetExceeded` outcome still carries a live frontier and can
/// be persisted and resumed under a larger budget.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub state: RunState,
    pub frontier: Vec<NodeId>,
    /// Supersteps executed, cumulative across resumes.
    pub supersteps: u64,
    pub error: Option<RunError>,
    pub budget: Option<BudgetKind>,
}

impl RunOutcome {
    /// Checkpoint this outcome for a later [`RunController::resume`].
    #[must_use]
    pub fn to_persisted(&self) -> PersistedRun {
        PersistedRun::new(
            self.run_id.clone(),
            self.state.values().clone(),
            &self.frontier,
            self.supersteps,
            self.status,
        )
    }
}

/// Post-merge view of one completed superstep, delivered by
/// [`RunController::stream`].
#[derive(Clone, Debug)]
pub struct StepSnapshot {
    pub superstep: u64,
    pub snapshot: StateSnapshot,
}

/// Requests cooperative cancellation of a run.
///
/// The paired [`CancelSignal`] is checked between supersteps only; a node
/// already in flight finishes (or times out) first.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of a [`CancelHandle`].
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Handle to a streaming run spawned by [`RunController::stream`].
pub struct StreamHandle {
    handle: JoinHandle<RunOutcome>,
}

impl StreamHandle {
    /// Wait for the run to finish and take its outcome.
    pub async fn join(self) -> Result<RunOutcome, JoinError> {
        self.handle.await
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// In-flight run bookkeeping: state, frontier, counter, status.
struct Run {
    id: String,
    state: RunState,
    frontier: Vec<NodeId>,
    superstep: u64,
    status: RunStatus,
}

impl Run {
    fn fresh(plan: &Plan, state: RunState) -> Self {
        Self {
            id: format!("run-{}", Uuid::new_v4()),
            state,
            frontier: vec![plan.entry().clone()],
            superstep: 0,
            status: RunStatus::Running,
        }
    }

    fn restore(persisted: PersistedRun, schema: Arc<StateSchema>) -> Result<Self, PersistenceError> {
        let state = RunState::from_values(schema, persisted.values)?;
        let frontier = persisted
            .frontier
            .iter()
            .map(|s| NodeId::decode(s))
            .collect();
        Ok(Self {
            id: persisted.run_id,
            state,
            frontier,
            superstep: persisted.superstep,
            status: persisted.status,
        })
    }
}

/// Drives runs of one compiled plan.
#[derive(Clone)]
pub struct RunController {
    plan: Arc<Plan>,
    config: RunConfig,
    events: EventEmitter,
}

impl RunController {
    pub fn new(plan: Plan) -> Self {
        Self::from_arc(Arc::new(plan))
    }

    pub fn from_arc(plan: Arc<Plan>) -> Self {
        Self {
            plan,
            config: RunConfig::default(),
            events: EventEmitter::disabled(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a sink for node-scoped [`RunEvent`]s.
    #[must_use]
    pub fn with_event_sink(mut self, sink: flume::Sender<RunEvent>) -> Self {
        self.events = EventEmitter::new(sink);
        self
    }

    /// Drive a fresh run to a terminal status.
    pub async fn start(&self, initial: RunState) -> RunOutcome {
        let run = Run::fresh(&self.plan, initial);
        drive_run(
            Arc::clone(&self.plan),
            self.config.clone(),
            self.events.clone(),
            run,
            None,
            |_, _| {},
        )
        .await
    }

    /// Like [`start`](Self::start), but checks `cancel` between supersteps.
    /// Cancellation yields `Failed` with [`RunError::Cancelled`].
    pub async fn start_with_cancel(&self, initial: RunState, cancel: CancelSignal) -> RunOutcome {
        let run = Run::fresh(&self.plan, initial);
        drive_run(
            Arc::clone(&self.plan),
            self.config.clone(),
            self.events.clone(),
            run,
            Some(cancel),
            |_, _| {},
        )
        .await
    }

    /// Rehydrate a checkpoint and continue it under this controller's plan
    /// and config.
    ///
    /// The caller must supply a schema and plan structurally equal to the
    /// ones that produced the checkpoint; reducers and node callbacks are
    /// never serialized. A checkpoint already in a `Completed` or `Failed`
    /// status is returned as-is without executing anything. The superstep
    /// counter continues where it left off, so resuming a `BudgetExceeded`
    /// run needs a larger `max_supersteps`.
    pub async fn resume(
        &self,
        persisted: PersistedRun,
        schema: Arc<StateSchema>,
    ) -> Result<RunOutcome, PersistenceError> {
        let mut run = Run::restore(persisted, schema)?;
        match run.status {
            RunStatus::Completed | RunStatus::Failed => {
                return Ok(RunOutcome {
                    run_id: run.id,
                    status: run.status,
                    state: run.state,
                    frontier: run.frontier,
                    supersteps: run.superstep,
                    error: None,
                    budget: None,
                });
            }
            RunStatus::Running | RunStatus::BudgetExceeded => {
                run.status = RunStatus::Running;
            }
        }
        Ok(drive_run(
            Arc::clone(&self.plan),
            self.config.clone(),
            self.events.clone(),
            run,
            None,
            |_, _| {},
        )
        .await)
    }

    /// Drive a fresh run on a background task, delivering one
    /// [`StepSnapshot`] per completed superstep.
    ///
    /// The receiver drains naturally once the run finishes; join the handle
    /// for the final outcome. Each call drives a new run; the stream is
    /// finite and not restartable.
    pub fn stream(&self, initial: RunState) -> (StreamHandle, flume::Receiver<StepSnapshot>) {
        let (tx, rx) = flume::unbounded();
        let plan = Arc::clone(&self.plan);
        let config = self.config.clone();
        let events = self.events.clone();
        let run = Run::fresh(&plan, initial);
        let handle = tokio::spawn(async move {
            drive_run(plan, config, events, run, None, move |superstep, snapshot| {
                let _ = tx.send(StepSnapshot {
                    superstep,
                    snapshot,
                });
            })
            .await
        });
        (StreamHandle { handle }, rx)
    }
}

/// The superstep loop shared by every entry point.
///
/// Between supersteps, in order: natural completion (empty frontier),
/// cancellation, wall-clock budget, superstep budget.
async fn drive_run(
    plan: Arc<Plan>,
    config: RunConfig,
    events: EventEmitter,
    mut run: Run,
    cancel: Option<CancelSignal>,
    mut on_step: impl FnMut(u64, StateSnapshot),
) -> RunOutcome {
    let started = Instant::now();
    let mut error: Option<RunError> = None;
    let mut budget: Option<BudgetKind> = None;

    loop {
        if run.frontier.is_empty() {
            run.status = RunStatus::Completed;
            break;
        }
        if let Some(signal) = &cancel {
            if signal.is_cancelled() {
                run.status = RunStatus::Failed;
                error = Some(RunError::Cancelled {
                    step: run.superstep,
                });
                break;
            }
        }
        if let Some(limit) = config.run_timeout {
            if started.elapsed() >= limit {
                run.status = RunStatus::BudgetExceeded;
                budget = Some(BudgetKind::WallClock);
                break;
            }
        }
        if run.superstep >= config.max_supersteps {
            run.status = RunStatus::BudgetExceeded;
            budget = Some(BudgetKind::Supersteps);
            break;
        }

        run.superstep += 1;
        let step = run.superstep;
        let span = tracing::info_span!(
            "superstep",
            run = %run.id,
            step,
            frontier = run.frontier.len()
        );
        let result =
            engine::run_superstep(&plan, &mut run.state, &run.frontier, step, &config, &events)
                .instrument(span)
                .await;
        match result {
            Ok(outcome) => {
                tracing::debug!(
                    step,
                    ran = outcome.ran.len(),
                    next = outcome.next_frontier.len(),
                    "superstep complete"
                );
                on_step(step, run.state.snapshot());
                if outcome.reached_terminal {
                    run.frontier = Vec::new();
                    run.status = RunStatus::Completed;
                    break;
                }
                run.frontier = outcome.next_frontier;
            }
            Err(run_error) => {
                run.status = RunStatus::Failed;
                error = Some(run_error);
                break;
            }
        }
    }

    tracing::info!(
        run = %run.id,
        status = ?run.status,
        supersteps = run.superstep,
        "run finished"
    );
    RunOutcome {
        run_id: run.id,
        status: run.status,
        state: run.state,
        frontier: run.frontier,
        supersteps: run.superstep,
        error,
        budget,
    }
}
