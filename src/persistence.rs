//! Checkpointing: the serde-friendly form of a run.
//!
//! Only data crosses the boundary: state values, the encoded frontier, the
//! superstep counter and the status. Reducers, node callbacks and routers
//! are never serialized; [`RunController::resume`](crate::runner::RunController::resume)
//! takes a schema (and runs under a plan) structurally equal to the
//! originals. Where the checkpoint bytes live is the caller's business.

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runner::RunStatus;
use crate::state::StateError;
use crate::types::NodeId;

/// Errors raised while persisting or rehydrating a run.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("checkpoint (de)serialization failed: {source}")]
    #[diagnostic(code(stepweave::persistence::serde))]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    /// The checkpoint carries a key the supplied schema does not declare.
    #[error("checkpoint does not match the supplied schema: {source}")]
    #[diagnostic(
        code(stepweave::persistence::schema_mismatch),
        help("Resume with the same StateSchema that produced the checkpoint.")
    )]
    SchemaMismatch {
        #[from]
        source: StateError,
    },
}

/// Snapshot of a run at a superstep boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedRun {
    pub run_id: String,
    /// Current state values, keyed by declared key.
    pub values: FxHashMap<String, Value>,
    /// Encoded frontier (see [`NodeId::encode`]).
    pub frontier: Vec<String>,
    /// Supersteps executed so far.
    pub superstep: u64,
    pub status: RunStatus,
    /// RFC 3339 timestamp of when the checkpoint was taken.
    pub saved_at: String,
}

impl PersistedRun {
    pub(crate) fn new(
        run_id: String,
        values: FxHashMap<String, Value>,
        frontier: &[NodeId],
        superstep: u64,
        status: RunStatus,
    ) -> Self {
        Self {
            run_id,
            values,
            frontier: frontier.iter().map(NodeId::encode).collect(),
            superstep,
            status,
            saved_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|source| PersistenceError::Serde { source })
    }

    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(json).map_err(|source| PersistenceError::Serde { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_preserves_every_field() {
        let mut values = FxHashMap::default();
        values.insert("data".to_string(), json!("raw"));
        let persisted = PersistedRun::new(
            "run-test".to_string(),
            values,
            &[NodeId::named("process"), NodeId::Terminal],
            3,
            RunStatus::BudgetExceeded,
        );
        let restored = PersistedRun::from_json(&persisted.to_json().unwrap()).unwrap();
        assert_eq!(restored, persisted);
        assert_eq!(restored.frontier, vec!["process", "end"]);
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let err = PersistedRun::from_json("{not json").unwrap_err();
        assert!(matches!(err, PersistenceError::Serde { .. }));
    }
}
