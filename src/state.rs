//! Run state: the mutable values owned by a single run, plus the read-only
//! snapshots handed to nodes and routers and the partial updates nodes
//! return.
//!
//! Nodes never mutate state. Within one superstep every node reads the same
//! pre-step [`StateSnapshot`]; the engine buffers the returned
//! [`PartialUpdate`]s and applies them through [`RunState::apply_update`] in
//! frontier order, one entry at a time through each key's reducer.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::StateSchema;

/// Errors raised while mutating run state.
#[derive(Debug, Error, Diagnostic)]
pub enum StateError {
    /// A write targeted a key the schema does not declare. Always fatal to
    /// the run; never routed through error edges.
    #[error("unknown state key: {key:?}")]
    #[diagnostic(
        code(stepweave::state::unknown_key),
        help("Declare the key in the StateSchema before any node writes to it.")
    )]
    UnknownKey { key: String },
}

/// An ordered set of key writes produced by one node invocation.
///
/// Order matters: when a node writes the same key twice, the entries reach
/// the reducer in insertion order.
#[derive(Clone, Debug, Default)]
pub struct PartialUpdate {
    entries: Vec<(String, Value)>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write, builder style.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    /// Append a write in place.
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
}

/// Read-only view of run state at a barrier.
///
/// Cheap to clone and safe to hand to concurrently running nodes; mutating
/// the run afterwards never changes an existing snapshot.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    values: FxHashMap<String, Value>,
}

impl StateSnapshot {
    /// Build a snapshot directly from a value map. Mostly useful for unit
    /// testing routers in isolation.
    pub fn from_values(values: FxHashMap<String, Value>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn values(&self) -> &FxHashMap<String, Value> {
        &self.values
    }
}

/// The mutable state owned by exactly one run.
///
/// Created from a schema (every declared key starts at its default), mutated
/// only through [`apply_update`](Self::apply_update), and surrendered to the
/// caller inside the final [`RunOutcome`](crate::runner::RunOutcome).
#[derive(Clone)]
pub struct RunState {
    schema: Arc<StateSchema>,
    values: FxHashMap<String, Value>,
}

impl RunState {
    /// Fresh state with every declared key at its default value.
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let values = schema.default_values();
        Self { schema, values }
    }

    /// Seed an initial value before the run starts, bypassing the reducer.
    ///
    /// Fails when `key` is not declared in the schema.
    pub fn seed(mut self, key: impl Into<String>, value: Value) -> Result<Self, StateError> {
        let key = key.into();
        if !self.schema.contains(&key) {
            return Err(StateError::UnknownKey { key });
        }
        self.values.insert(key, value);
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    pub fn values(&self) -> &FxHashMap<String, Value> {
        &self.values
    }

    /// Read-only view of the current values.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            values: self.values.clone(),
        }
    }

    /// Merge one node's partial update, entry by entry in its insertion
    /// order, through each key's declared reducer.
    pub fn apply_update(&mut self, update: &PartialUpdate) -> Result<(), StateError> {
        for (key, incoming) in update.entries() {
            let Some(spec) = self.schema.spec(key) else {
                return Err(StateError::UnknownKey { key: key.clone() });
            };
            let current = self.values.get(key).unwrap_or(&spec.default);
            let merged = spec.reducer.merge(current, incoming);
            self.values.insert(key.clone(), merged);
        }
        Ok(())
    }

    /// Rehydrate state from persisted values. Declared keys absent from
    /// `values` fall back to their defaults; undeclared keys are rejected.
    pub(crate) fn from_values(
        schema: Arc<StateSchema>,
        values: FxHashMap<String, Value>,
    ) -> Result<Self, StateError> {
        let mut state = RunState::new(schema);
        for (key, value) in values {
            if !state.schema.contains(&key) {
                return Err(StateError::UnknownKey { key });
            }
            state.values.insert(key, value);
        }
        Ok(state)
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("values", &self.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Arc<StateSchema> {
        Arc::new(
            StateSchema::builder()
                .overwrite("data", json!(""))
                .append_sequence("log")
                .build(),
        )
    }

    #[test]
    fn apply_update_respects_entry_order() {
        let mut state = RunState::new(schema());
        let update = PartialUpdate::new()
            .set("log", json!("first"))
            .set("log", json!("second"))
            .set("data", json!("x"));
        state.apply_update(&update).unwrap();
        assert_eq!(state.get("log"), Some(&json!(["first", "second"])));
        assert_eq!(state.get("data"), Some(&json!("x")));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut state = RunState::new(schema());
        let update = PartialUpdate::new().set("nope", json!(1));
        let err = state.apply_update(&update).unwrap_err();
        assert!(matches!(err, StateError::UnknownKey { key } if key == "nope"));
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let mut state = RunState::new(schema());
        let before = state.snapshot();
        state
            .apply_update(&PartialUpdate::new().set("data", json!("changed")))
            .unwrap();
        assert_eq!(before.get_str("data"), Some(""));
        assert_eq!(state.get("data"), Some(&json!("changed")));
    }

    #[test]
    fn seed_rejects_undeclared_keys() {
        let state = RunState::new(schema()).seed("data", json!("seeded")).unwrap();
        assert_eq!(state.get("data"), Some(&json!("seeded")));
        assert!(RunState::new(schema()).seed("ghost", json!(1)).is_err());
    }
}
