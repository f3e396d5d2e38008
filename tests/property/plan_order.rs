//! Property-based tests for regeneration plan ordering

use crate::property::strategies::{any_graph, dag, node_id, reachable};
use dialogen::context::generation::RegenerationPlan;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Start first, no duplicates, and exactly the nodes reachable from start.
#[test]
fn test_plan_covers_reachable_set_once() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any_graph(), 0usize..12), |(view, pick)| {
            let start = node_id(pick % view.nodes.len());
            let plan = RegenerationPlan::build(&start, &view).unwrap();

            prop_assert_eq!(&plan.order[0], &start);
            let unique: HashSet<String> = plan.order.iter().cloned().collect();
            prop_assert_eq!(unique.len(), plan.order.len());
            prop_assert_eq!(unique, reachable(&view, &start, true));
            Ok(())
        })
        .unwrap();
}

/// On acyclic graphs every planned edge runs forward in the plan.
#[test]
fn test_dag_plan_is_topological() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(dag(), 0usize..12), |(view, pick)| {
            let start = node_id(pick % view.nodes.len());
            let plan = RegenerationPlan::build(&start, &view).unwrap();
            let position: HashMap<&str, usize> = plan
                .order
                .iter()
                .enumerate()
                .map(|(index, id)| (id.as_str(), index))
                .collect();

            for edge in &view.edges {
                if let (Some(from), Some(to)) = (
                    position.get(edge.source.as_str()),
                    position.get(edge.target.as_str()),
                ) {
                    prop_assert!(from < to, "{} planned after {}", edge.source, edge.target);
                }
            }
            Ok(())
        })
        .unwrap();
}

/// Building twice from the same graph gives the same order.
#[test]
fn test_plan_order_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any_graph(), 0usize..12), |(view, pick)| {
            let start = node_id(pick % view.nodes.len());
            let first = RegenerationPlan::build(&start, &view).unwrap();
            let second = RegenerationPlan::build(&start, &view).unwrap();
            prop_assert_eq!(first.order, second.order);
            Ok(())
        })
        .unwrap();
}
