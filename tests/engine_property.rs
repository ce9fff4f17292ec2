//! Property: merged results are a pure function of graph, initial state and
//! frontier order, independent of task scheduling.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use stepweave::schema::StateSchema;
use stepweave::testing::{AppendNode, SetKeyNode};
use stepweave::{GraphBuilder, Plan, RunConfig, RunController, RunState, RunStatus};

fn fan_out_plan(values: &[String]) -> Plan {
    let mut builder = GraphBuilder::new()
        .add_node("seed", SetKeyNode::new("seeded", json!(true)))
        .set_entry("seed");
    for (i, value) in values.iter().enumerate() {
        let id = format!("writer-{i}");
        builder = builder
            .add_node(id.clone(), AppendNode::new("log", json!(value)))
            .add_edge("seed", id.clone())
            .add_edge(id, "end");
    }
    builder.compile().unwrap()
}

fn schema() -> Arc<StateSchema> {
    Arc::new(
        StateSchema::builder()
            .overwrite("seeded", json!(false))
            .append_sequence("log")
            .build(),
    )
}

async fn run_fan_out(values: &[String], parallel: bool) -> stepweave::RunOutcome {
    RunController::new(fan_out_plan(values))
        .with_config(RunConfig::new().with_parallelize_frontier(parallel))
        .start(RunState::new(schema()))
        .await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn fan_out_merges_in_frontier_order_regardless_of_scheduling(
        values in proptest::collection::vec("[a-z]{1,8}", 1..6)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (first, second, sequential) = runtime.block_on(async {
            (
                run_fan_out(&values, true).await,
                run_fan_out(&values, true).await,
                run_fan_out(&values, false).await,
            )
        });

        prop_assert_eq!(first.status, RunStatus::Completed);
        prop_assert_eq!(first.supersteps, 2);

        // The log reflects fan-out registration order, every time.
        let expected: Vec<_> = values.iter().map(|v| json!(v)).collect();
        prop_assert_eq!(first.state.get("log"), Some(&json!(expected)));

        // Identical inputs, identical results, parallel or not.
        prop_assert_eq!(first.state.values(), second.state.values());
        prop_assert_eq!(first.state.values(), sequential.state.values());
        prop_assert_eq!(first.supersteps, sequential.supersteps);
    }
}
