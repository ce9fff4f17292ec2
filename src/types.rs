//! Core identifier types for workflow graphs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `NodeId::Terminal` is a sentinel target, not a real node: routing to it
/// completes the run, it carries no implementation, and it never has outgoing
/// edges. Every other participant is a `Named` node backed by a registered
/// [`Node`](crate::node::Node).
///
/// The string `"end"` is reserved: `NodeId::from("end")` yields the terminal
/// marker, and [`encode`](Self::encode)/[`decode`](Self::decode) round-trip
/// it through that spelling for persistence.
///
/// # Examples
///
/// ```rust
/// use stepweave::types::NodeId;
///
/// let plan = NodeId::named("plan");
/// assert_eq!(plan.encode(), "plan");
/// assert_eq!(NodeId::decode("plan"), plan);
/// assert!(NodeId::from("end").is_terminal());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    /// Sentinel target that completes a run when routing reaches it.
    Terminal,
    /// A real node registered with the graph builder.
    Named(String),
}

impl NodeId {
    /// Construct a named node id.
    pub fn named(name: impl Into<String>) -> Self {
        NodeId::Named(name.into())
    }

    /// Encode into the persisted string form: `"end"` for the terminal
    /// marker, the plain name otherwise.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeId::Terminal => "end".to_string(),
            NodeId::Named(name) => name.clone(),
        }
    }

    /// Decode a persisted string form back into a `NodeId`.
    pub fn decode(s: &str) -> Self {
        if s == "end" {
            NodeId::Terminal
        } else {
            NodeId::Named(s.to_string())
        }
    }

    /// Returns `true` for the terminal marker.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeId::Terminal)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Terminal => write!(f, "end"),
            NodeId::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::decode(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::decode(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        for id in [NodeId::Terminal, NodeId::named("review")] {
            assert_eq!(NodeId::decode(&id.encode()), id);
        }
    }

    #[test]
    fn end_spelling_is_reserved() {
        assert_eq!(NodeId::from("end"), NodeId::Terminal);
        assert_eq!(NodeId::from("End"), NodeId::named("End"));
    }
}
