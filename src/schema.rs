//! State schemas: the declared key set of a run, with one reducer per key.
//!
//! Every key a node may write must be declared up front with a default value
//! and a [`Reducer`]. The reducer is the only merge authority for its key;
//! the engine never writes state directly. Reducers must be pure and total
//! over JSON values so that barrier merges stay deterministic.

use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Merge authority for a single state key.
///
/// `merge` receives the current value and one incoming partial value and
/// returns the new value. Implementations must be pure (no interior state,
/// no IO) and total (defined for every pair of JSON values); the engine
/// relies on both for deterministic replay.
pub trait Reducer: Send + Sync {
    fn merge(&self, current: &Value, incoming: &Value) -> Value;
}

/// Replaces the current value with the incoming one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overwrite;

impl Reducer for Overwrite {
    fn merge(&self, _current: &Value, incoming: &Value) -> Value {
        incoming.clone()
    }
}

/// Appends incoming items to an ordered list.
///
/// An incoming array is appended element-wise; any other incoming value is
/// appended as a single element. A non-array current value is treated as a
/// one-element list (null as empty).
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendSequence;

impl Reducer for AppendSequence {
    fn merge(&self, current: &Value, incoming: &Value) -> Value {
        let mut items = as_list(current);
        match incoming {
            Value::Array(extra) => items.extend(extra.iter().cloned()),
            other => items.push(other.clone()),
        }
        Value::Array(items)
    }
}

/// Adds the incoming number to the current one.
///
/// Integer arithmetic when both sides are integral, floating point
/// otherwise; non-numeric values count as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncrementCounter;

impl Reducer for IncrementCounter {
    fn merge(&self, current: &Value, incoming: &Value) -> Value {
        if let (Some(a), Some(b)) = (current.as_i64(), incoming.as_i64()) {
            json!(a + b)
        } else {
            let a = current.as_f64().unwrap_or(0.0);
            let b = incoming.as_f64().unwrap_or(0.0);
            json!(a + b)
        }
    }
}

/// Set union over a list, preserving first-occurrence order.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnionSet;

impl Reducer for UnionSet {
    fn merge(&self, current: &Value, incoming: &Value) -> Value {
        let mut items = as_list(current);
        let incoming_items = as_list(incoming);
        for item in incoming_items {
            if !items.contains(&item) {
                items.push(item);
            }
        }
        Value::Array(items)
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

pub(crate) struct KeySpec {
    pub(crate) default: Value,
    pub(crate) reducer: Arc<dyn Reducer>,
}

/// Immutable declaration of a run's state keys.
///
/// Built once via [`StateSchema::builder`] and shared (`Arc`) between the
/// initial [`RunState`](crate::state::RunState) and any resumed runs; a
/// resumed run must use a schema structurally equal to the original.
pub struct StateSchema {
    keys: FxHashMap<String, KeySpec>,
}

impl StateSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Whether `key` is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub(crate) fn spec(&self, key: &str) -> Option<&KeySpec> {
        self.keys.get(key)
    }

    /// The declared keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// A fresh value map seeded with every key's default.
    pub(crate) fn default_values(&self) -> FxHashMap<String, Value> {
        self.keys
            .iter()
            .map(|(key, spec)| (key.clone(), spec.default.clone()))
            .collect()
    }
}

impl fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.keys().collect();
        names.sort_unstable();
        f.debug_struct("StateSchema").field("keys", &names).finish()
    }
}

/// Fluent builder for [`StateSchema`].
///
/// ```rust
/// use serde_json::json;
/// use stepweave::schema::StateSchema;
///
/// let schema = StateSchema::builder()
///     .overwrite("data", json!(""))
///     .append_sequence("log")
///     .counter("revisions")
///     .build();
/// assert!(schema.contains("log"));
/// ```
#[derive(Default)]
pub struct SchemaBuilder {
    keys: FxHashMap<String, KeySpec>,
}

impl SchemaBuilder {
    /// Declare a key with overwrite semantics and the given default.
    #[must_use]
    pub fn overwrite(self, key: impl Into<String>, default: Value) -> Self {
        self.custom(key, default, Arc::new(Overwrite))
    }

    /// Declare an append-sequence key (default: empty list).
    #[must_use]
    pub fn append_sequence(self, key: impl Into<String>) -> Self {
        self.custom(key, json!([]), Arc::new(AppendSequence))
    }

    /// Declare a numeric counter key (default: 0).
    #[must_use]
    pub fn counter(self, key: impl Into<String>) -> Self {
        self.custom(key, json!(0), Arc::new(IncrementCounter))
    }

    /// Declare a union-set key (default: empty list).
    #[must_use]
    pub fn union_set(self, key: impl Into<String>) -> Self {
        self.custom(key, json!([]), Arc::new(UnionSet))
    }

    /// Declare a key with a caller-supplied reducer.
    #[must_use]
    pub fn custom(mut self, key: impl Into<String>, default: Value, reducer: Arc<dyn Reducer>) -> Self {
        self.keys.insert(key.into(), KeySpec { default, reducer });
        self
    }

    pub fn build(self) -> StateSchema {
        StateSchema { keys: self.keys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_replaces() {
        let merged = Overwrite.merge(&json!("old"), &json!("new"));
        assert_eq!(merged, json!("new"));
    }

    #[test]
    fn append_sequence_flattens_arrays_and_wraps_scalars() {
        let merged = AppendSequence.merge(&json!(["a"]), &json!(["b", "c"]));
        assert_eq!(merged, json!(["a", "b", "c"]));
        let merged = AppendSequence.merge(&merged, &json!("d"));
        assert_eq!(merged, json!(["a", "b", "c", "d"]));
    }

    #[test]
    fn counter_prefers_integer_arithmetic() {
        assert_eq!(IncrementCounter.merge(&json!(2), &json!(3)), json!(5));
        assert_eq!(IncrementCounter.merge(&json!(1.5), &json!(1)), json!(2.5));
        assert_eq!(IncrementCounter.merge(&json!(null), &json!(4)), json!(4.0));
    }

    #[test]
    fn union_set_deduplicates_preserving_order() {
        let merged = UnionSet.merge(&json!(["a", "b"]), &json!(["b", "c", "a"]));
        assert_eq!(merged, json!(["a", "b", "c"]));
    }

    #[test]
    fn defaults_seed_every_declared_key() {
        let schema = StateSchema::builder()
            .overwrite("data", json!(""))
            .counter("n")
            .build();
        let values = schema.default_values();
        assert_eq!(values.get("data"), Some(&json!("")));
        assert_eq!(values.get("n"), Some(&json!(0)));
    }
}
