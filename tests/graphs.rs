//! Compile-time validation of graph definitions.

mod common;

use serde_json::json;
use std::sync::Arc;
use stepweave::state::StateSnapshot;
use stepweave::testing::{FailingNode, SetKeyNode};
use stepweave::{GraphBuilder, GraphCompileError, NodeId, RouteMap};

fn noop(key: &str) -> SetKeyNode {
    SetKeyNode::new(key, json!(true))
}

#[test]
fn duplicate_node_ids_are_rejected() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_node("work", noop("b"))
        .add_edge("work", "end")
        .set_entry("work")
        .compile()
        .unwrap_err();
    assert!(
        matches!(err, GraphCompileError::DuplicateNodeId { id } if id == NodeId::named("work"))
    );
}

#[test]
fn unknown_edge_target_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_edge("work", "ghost")
        .set_entry("work")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphCompileError::UnknownNodeReference { id, .. } if id == NodeId::named("ghost")
    ));
}

#[test]
fn unknown_route_target_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_conditional_edge(
            "work",
            Arc::new(|_: StateSnapshot| "go".to_string()),
            RouteMap::new().to_node("go", "ghost"),
        )
        .set_entry("work")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphCompileError::UnknownNodeReference { id, .. } if id == NodeId::named("ghost")
    ));
}

#[test]
fn missing_entry_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_edge("work", "end")
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphCompileError::EntryUndefined));
}

#[test]
fn undeclared_entry_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_edge("work", "end")
        .set_entry("ghost")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphCompileError::UnknownNodeReference { id, .. } if id == NodeId::named("ghost")
    ));
}

#[test]
fn terminal_marker_cannot_be_an_edge_source() {
    let err = GraphBuilder::new()
        .add_node("work", noop("a"))
        .add_edge("end", "work")
        .add_edge("work", "end")
        .set_entry("work")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        GraphCompileError::UnknownNodeReference { id, .. } if id.is_terminal()
    ));
}

#[test]
fn graph_without_path_to_terminal_is_rejected() {
    let err = GraphBuilder::new()
        .add_node("a", noop("a"))
        .add_node("b", noop("b"))
        .add_edge("a", "b")
        .add_edge("b", "a")
        .set_entry("a")
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphCompileError::UnreachableTerminal { .. }));
}

#[test]
fn allow_unbounded_bypasses_terminal_reachability() {
    let plan = GraphBuilder::new()
        .add_node("a", noop("a"))
        .add_node("b", noop("b"))
        .add_edge("a", "b")
        .add_edge("b", "a")
        .set_entry("a")
        .allow_unbounded()
        .compile()
        .unwrap();
    assert_eq!(plan.entry(), &NodeId::named("a"));
}

#[test]
fn one_terminating_route_choice_suffices() {
    // "review" can loop back forever, but the "complete" label can end the
    // run, so the graph is bounded.
    let plan = GraphBuilder::new()
        .add_node("plan", noop("planned"))
        .add_node("review", noop("reviewed"))
        .add_edge("plan", "review")
        .add_conditional_edge(
            "review",
            Arc::new(|_: StateSnapshot| "revise".to_string()),
            RouteMap::new()
                .to_node("revise", "plan")
                .to_end("complete"),
        )
        .set_entry("plan")
        .compile()
        .unwrap();
    assert!(plan.is_reachable(&NodeId::named("review")));
}

#[test]
fn error_edges_count_toward_reachability() {
    // The only way to the terminal marker is the error edge.
    let plan = GraphBuilder::new()
        .add_node("risky", FailingNode::new("boom"))
        .add_error_edge("risky", "end")
        .set_entry("risky")
        .compile()
        .unwrap();
    assert!(plan.error_edge(&NodeId::named("risky")).is_some());
}

#[test]
fn nodes_unreachable_from_entry_are_flagged_in_plan() {
    let plan = GraphBuilder::new()
        .add_node("main", noop("m"))
        .add_node("island", noop("i"))
        .add_edge("main", "end")
        .add_edge("island", "end")
        .set_entry("main")
        .compile()
        .unwrap();
    assert!(plan.is_reachable(&NodeId::named("main")));
    assert!(!plan.is_reachable(&NodeId::named("island")));
}

#[test]
fn pipeline_fixture_compiles() {
    let plan = common::pipeline_plan();
    assert_eq!(plan.node_count(), 2);
    assert_eq!(plan.entry(), &NodeId::named("load"));
}
