#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use stepweave::schema::StateSchema;
use stepweave::state::StateSnapshot;
use stepweave::{GraphBuilder, Plan, RouteMap, RunState};
use stepweave::testing::SetKeyNode;

/// Schema for the two-step load/process pipeline.
pub fn pipeline_schema() -> Arc<StateSchema> {
    Arc::new(
        StateSchema::builder()
            .overwrite("data", json!(""))
            .overwrite("processed", json!(false))
            .build(),
    )
}

/// The canonical two-superstep pipeline: `load` writes raw data, `process`
/// marks it processed, and a router on `process` completes the run.
pub fn pipeline_plan() -> Plan {
    GraphBuilder::new()
        .add_node("load", SetKeyNode::new("data", json!("raw")))
        .add_node("process", SetKeyNode::new("processed", json!(true)))
        .add_edge("load", "process")
        .add_conditional_edge(
            "process",
            Arc::new(|snap: StateSnapshot| {
                if snap.get_bool("processed").unwrap_or(false) {
                    "complete".to_string()
                } else {
                    "retry".to_string()
                }
            }),
            RouteMap::new()
                .to_end("complete")
                .to_node("retry", "process"),
        )
        .set_entry("load")
        .compile()
        .expect("pipeline graph should compile")
}

pub fn pipeline_state() -> RunState {
    RunState::new(pipeline_schema())
}
