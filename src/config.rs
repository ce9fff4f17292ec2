//! Run-level configuration.

use std::time::Duration;

/// Default cap on supersteps per run.
pub const DEFAULT_MAX_SUPERSTEPS: u64 = 25;

/// Tunables for a [`RunController`](crate::runner::RunController).
///
/// Budgets guarantee termination: a run stops with `BudgetExceeded` once it
/// has executed `max_supersteps` barriers or (when set) once `run_timeout`
/// wall-clock time has elapsed, both checked between supersteps.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Maximum number of supersteps before the run is cut off.
    pub max_supersteps: u64,
    /// Optional timeout applied to each individual node invocation.
    pub per_node_timeout: Option<Duration>,
    /// Optional wall-clock budget for the whole run.
    pub run_timeout: Option<Duration>,
    /// Run frontier members as concurrent tasks (`true`, the default) or
    /// sequentially. Merged results are identical either way.
    pub parallelize_frontier: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_supersteps: DEFAULT_MAX_SUPERSTEPS,
            per_node_timeout: None,
            run_timeout: None,
            parallelize_frontier: true,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_supersteps(mut self, max: u64) -> Self {
        self.max_supersteps = max;
        self
    }

    #[must_use]
    pub fn with_per_node_timeout(mut self, timeout: Duration) -> Self {
        self.per_node_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_parallelize_frontier(mut self, parallel: bool) -> Self {
        self.parallelize_frontier = parallel;
        self
    }
}
