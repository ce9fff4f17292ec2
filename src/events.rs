//! Node-scoped observability events.
//!
//! A [`RunController`](crate::runner::RunController) can be given a flume
//! sender; node implementations then reach it through
//! [`NodeContext::emit`](crate::node::NodeContext::emit). Emission is best
//! effort: without a sink, or once the receiver hangs up, events are dropped
//! silently so observability never interferes with execution.

use chrono::{DateTime, Utc};

use crate::types::NodeId;

/// An observability event emitted during a run.
#[derive(Clone, Debug)]
pub enum RunEvent {
    /// A message emitted by a node invocation.
    NodeMessage {
        node: NodeId,
        superstep: u64,
        scope: String,
        message: String,
        when: DateTime<Utc>,
    },
}

/// Best-effort emitter handed to nodes through their context.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sink: Option<flume::Sender<RunEvent>>,
}

impl EventEmitter {
    /// Emitter with no sink attached; every emit is a no-op.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn new(sink: flume::Sender<RunEvent>) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn emit_node(
        &self,
        node: NodeId,
        superstep: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        let event = RunEvent::NodeMessage {
            node,
            superstep,
            scope: scope.into(),
            message: message.into(),
            when: Utc::now(),
        };
        if sink.send(event).is_err() {
            tracing::debug!("event sink disconnected; dropping node event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_an_attached_sink() {
        let (tx, rx) = flume::unbounded();
        let emitter = EventEmitter::new(tx);
        emitter.emit_node(NodeId::named("worker"), 3, "progress", "halfway");
        let RunEvent::NodeMessage {
            node,
            superstep,
            scope,
            message,
            ..
        } = rx.recv().unwrap();
        assert_eq!(node, NodeId::named("worker"));
        assert_eq!(superstep, 3);
        assert_eq!(scope, "progress");
        assert_eq!(message, "halfway");
    }

    #[test]
    fn disabled_emitter_is_a_no_op() {
        EventEmitter::disabled().emit_node(NodeId::named("n"), 1, "s", "m");
    }
}
