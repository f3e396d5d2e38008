//! Graph generators shared by the property tests

use dialogen::graph::{DialogNode, Edge, GraphView};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

pub fn node_id(index: usize) -> String {
    format!("n{}", index)
}

fn build(count: usize, edges: Vec<(usize, usize)>) -> GraphView {
    GraphView::new(
        (0..count)
            .map(|i| DialogNode::new(node_id(i), "dialog", format!("line {}", i)))
            .collect(),
        edges
            .into_iter()
            .map(|(s, t)| Edge::new(node_id(s), node_id(t)))
            .collect(),
    )
    .unwrap()
}

/// Any directed graph, self loops and cycles included.
pub fn any_graph() -> impl Strategy<Value = GraphView> {
    (1usize..12).prop_flat_map(|count| {
        prop::collection::vec((0..count, 0..count), 0..count * 3)
            .prop_map(move |edges| build(count, edges))
    })
}

/// Acyclic graphs: every edge points from a lower to a higher index.
pub fn dag() -> impl Strategy<Value = GraphView> {
    (1usize..12).prop_flat_map(|count| {
        prop::collection::vec((0..count, 0..count), 0..count * 3).prop_map(move |pairs| {
            let edges = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            build(count, edges)
        })
    })
}

/// Hop distance from `from` to every reachable node, following edges forward or backward.
pub fn distances(view: &GraphView, from: &str, forward: bool) -> HashMap<String, usize> {
    let mut dist = HashMap::from([(from.to_string(), 0usize)]);
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(current) = queue.pop_front() {
        let depth = dist[&current];
        for edge in &view.edges {
            let (here, there) = if forward {
                (&edge.source, &edge.target)
            } else {
                (&edge.target, &edge.source)
            };
            if *here == current && !dist.contains_key(there) {
                dist.insert(there.clone(), depth + 1);
                queue.push_back(there.clone());
            }
        }
    }
    dist
}

pub fn reachable(view: &GraphView, from: &str, forward: bool) -> HashSet<String> {
    distances(view, from, forward).into_keys().collect()
}
