//! Regeneration plans: start-first traversal order for bulk runs, and the
//! summary a run produces.

use crate::error::{ApiError, FailureKind};
use crate::graph::GraphView;
use crate::telemetry::now_millis;
use crate::types::NodeID;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Ordered, deduplicated, start-first list of nodes to regenerate in one run.
///
/// Order is reverse depth-first postorder over outbound edges: within a branch an
/// ancestor always precedes its descendants. The relative order of sibling
/// branches follows edge order and carries no further meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationPlan {
    pub plan_id: String,
    pub start: NodeID,
    pub order: Vec<NodeID>,
}

impl RegenerationPlan {
    /// Plan a run from `start`. Fails with `NodeNotFound` when `start` is not in `view`.
    pub fn build(start: &str, view: &GraphView) -> Result<Self, ApiError> {
        if !view.contains(start) {
            return Err(ApiError::NodeNotFound(start.to_string()));
        }
        let order = dedupe(stabilize_start(traversal_order(start, view), start));
        let plan = Self {
            plan_id: format!("plan-{}-{}", now_millis(), start),
            start: start.to_string(),
            order,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.order.first().map(String::as_str) != Some(self.start.as_str()) {
            return Err(ApiError::GenerationFailed(format!(
                "Regeneration plan {} must start with node {}",
                self.plan_id, self.start
            )));
        }
        let mut seen = HashSet::with_capacity(self.order.len());
        if let Some(duplicate) = self.order.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ApiError::GenerationFailed(format!(
                "Regeneration plan {} lists node {} twice",
                self.plan_id, duplicate
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.order.iter().any(|id| id == node_id)
    }
}

/// Reverse postorder of a depth-first walk from `start` along outbound edges.
///
/// Iterative, with a visited set, so cycles terminate. Edge targets missing from
/// the view are not planned.
pub fn traversal_order(start: &str, view: &GraphView) -> Vec<NodeID> {
    let known: HashSet<&str> = view.nodes.iter().map(|node| node.id.as_str()).collect();
    if !known.contains(start) {
        return Vec::new();
    }
    let mut outbound: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &view.edges {
        if known.contains(edge.target.as_str()) {
            outbound
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
    let mut order: VecDeque<NodeID> = VecDeque::new();

    while let Some((node_id, child_index)) = stack.last_mut() {
        let children = outbound.get(*node_id).map(Vec::as_slice).unwrap_or(&[]);
        match children.get(*child_index) {
            Some(&child) => {
                *child_index += 1;
                if visited.insert(child) {
                    stack.push((child, 0));
                }
            }
            None => {
                order.push_front(node_id.to_string());
                stack.pop();
            }
        }
    }
    order.into()
}

/// Force `start` to the front, keeping the relative order of everything else.
fn stabilize_start(mut order: Vec<NodeID>, start: &str) -> Vec<NodeID> {
    if let Some(position) = order.iter().position(|id| id == start) {
        if position > 0 {
            let start_id = order.remove(position);
            order.insert(0, start_id);
        }
    }
    order
}

fn dedupe(order: Vec<NodeID>) -> Vec<NodeID> {
    let mut seen = HashSet::with_capacity(order.len());
    order
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: NodeID,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one bulk run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRunSummary {
    pub run_id: String,
    pub plan_id: String,
    pub start: NodeID,
    pub plan: Vec<NodeID>,
    pub generated: Vec<NodeID>,
    pub failed: Vec<NodeFailure>,
    /// Container nodes passed over without generation
    pub skipped: Vec<NodeID>,
    /// Planned nodes absent from the live view when their turn came
    pub missing: Vec<NodeID>,
}

impl BulkRunSummary {
    pub fn new(run_id: String, plan: &RegenerationPlan) -> Self {
        Self {
            run_id,
            plan_id: plan.plan_id.clone(),
            start: plan.start.clone(),
            plan: plan.order.clone(),
            generated: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn timeouts(&self) -> usize {
        self.failed
            .iter()
            .filter(|failure| failure.kind == FailureKind::Timeout)
            .count()
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Regenerated {} of {} nodes from {}: generated={}, failed={}, skipped={}, missing={}",
            self.generated.len(),
            self.plan.len(),
            self.start,
            self.generated.len(),
            self.failed.len(),
            self.skipped.len(),
            self.missing.len()
        );
        line.push_str(&self.failure_samples(3));
        line
    }

    fn failure_samples(&self, max_samples: usize) -> String {
        let mut messages: Vec<&str> = self
            .failed
            .iter()
            .map(|failure| failure.message.as_str())
            .collect();
        messages.sort_unstable();
        messages.dedup();

        let samples: Vec<&str> = messages.into_iter().take(max_samples).collect();
        if samples.is_empty() {
            return String::new();
        }

        let mut out = format!(". Sample errors: {}", samples.join(" | "));
        let remaining = self.failed.len().saturating_sub(samples.len());
        if remaining > 0 {
            out.push_str(&format!(" | ... and {} more", remaining));
        }
        out
    }
}
