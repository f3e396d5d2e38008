//! Graph context builder.
//!
//! Derives the previous/next slices around a focal node by walking inbound and
//! outbound edges breadth-first, so each list is ordered nearest first. Each
//! direction keeps its own visited set; cycles terminate and no node is listed twice.
//! Nothing here writes to the view.

use crate::graph::{DialogNode, GraphView};
use crate::types::NodeID;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Character budget for the serialized context summary
pub const DEFAULT_CONTEXT_BUDGET: usize = 2000;

/// Node as it appears inside a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: NodeID,
    #[serde(rename = "type")]
    pub node_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl From<&DialogNode> for ContextNode {
    fn from(node: &DialogNode) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            text: node.text.clone(),
            tags: node.metadata.tags.clone(),
        }
    }
}

/// Options for a single context build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    /// Force previous/next/siblings empty regardless of topology
    pub isolate: bool,
    /// Replacement for the computed next list
    pub next_override: Option<Vec<NodeID>>,
    pub include_siblings: bool,
    pub budget: usize,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            isolate: false,
            next_override: None,
            include_siblings: false,
            budget: DEFAULT_CONTEXT_BUDGET,
        }
    }
}

impl ContextRequest {
    pub fn isolated(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    pub fn with_next_override(mut self, next: Vec<NodeID>) -> Self {
        self.next_override = Some(next);
        self
    }

    pub fn with_siblings(mut self, include: bool) -> Self {
        self.include_siblings = include;
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }
}

/// Read-only context snapshot for one focal node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogContext {
    pub previous: Vec<ContextNode>,
    pub current: ContextNode,
    pub next: Vec<ContextNode>,
    #[serde(default)]
    pub siblings: Vec<ContextNode>,
    /// Deterministic encoding of the above, truncated to the request budget
    pub summary: String,
}

impl DialogContext {
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty() && self.next.is_empty() && self.siblings.is_empty()
    }
}

#[derive(Serialize)]
struct SummaryPayload<'a> {
    previous: &'a [ContextNode],
    current: &'a ContextNode,
    next: &'a [ContextNode],
    #[serde(skip_serializing_if = "<[ContextNode]>::is_empty")]
    siblings: &'a [ContextNode],
}

#[derive(Clone, Copy)]
enum Direction {
    Inbound,
    Outbound,
}

struct Adjacency<'a> {
    nodes: HashMap<&'a str, &'a DialogNode>,
    inbound: HashMap<&'a str, Vec<&'a str>>,
    outbound: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    fn new(view: &'a GraphView) -> Self {
        let nodes = view
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();
        let mut inbound: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut outbound: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &view.edges {
            outbound
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            inbound
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }
        Self {
            nodes,
            inbound,
            outbound,
        }
    }

    fn neighbors(&self, node_id: &str, direction: Direction) -> &[&'a str] {
        let map = match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        };
        map.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn walk(&self, focal: &'a str, direction: Direction) -> Vec<ContextNode> {
        let mut visited: HashSet<&str> = HashSet::from([focal]);
        let mut queue = VecDeque::from([focal]);
        let mut out = Vec::new();
        while let Some(node_id) = queue.pop_front() {
            for &neighbor in self.neighbors(node_id, direction) {
                if !visited.insert(neighbor) {
                    continue;
                }
                // Dangling edge targets are skipped and not traversed through.
                if let Some(node) = self.nodes.get(neighbor) {
                    out.push(ContextNode::from(*node));
                    queue.push_back(neighbor);
                }
            }
        }
        out
    }
}

/// Build the context for `focal_id`. Returns `None` when the node is not in `view`.
pub fn build_context(
    focal_id: &str,
    view: &GraphView,
    request: &ContextRequest,
) -> Option<DialogContext> {
    let focal = view.node(focal_id)?;
    let current = ContextNode::from(focal);

    let (previous, next, siblings) = if request.isolate {
        (Vec::new(), Vec::new(), Vec::new())
    } else {
        let adjacency = Adjacency::new(view);
        let previous = adjacency.walk(focal.id.as_str(), Direction::Inbound);
        let next = match &request.next_override {
            Some(ids) => resolve_override(view, ids),
            None => adjacency.walk(focal.id.as_str(), Direction::Outbound),
        };
        let siblings = if request.include_siblings {
            find_siblings(focal_id, view)
        } else {
            Vec::new()
        };
        (previous, next, siblings)
    };

    let summary = serialize_summary(&previous, &current, &next, &siblings, request.budget);
    Some(DialogContext {
        previous,
        current,
        next,
        siblings,
        summary,
    })
}

/// Nodes sharing a direct parent and the node type with `focal_id`, in view order.
pub fn find_siblings(focal_id: &str, view: &GraphView) -> Vec<ContextNode> {
    let Some(focal) = view.node(focal_id) else {
        return Vec::new();
    };
    let parents: HashSet<&str> = view.parents_of(focal_id).into_iter().collect();
    if parents.is_empty() {
        return Vec::new();
    }
    let candidates: HashSet<&str> = view
        .edges
        .iter()
        .filter(|edge| parents.contains(edge.source.as_str()))
        .map(|edge| edge.target.as_str())
        .filter(|target| *target != focal_id)
        .collect();
    view.nodes
        .iter()
        .filter(|node| candidates.contains(node.id.as_str()) && node.node_type == focal.node_type)
        .map(ContextNode::from)
        .collect()
}

fn resolve_override(view: &GraphView, ids: &[NodeID]) -> Vec<ContextNode> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| view.node(id))
        .map(ContextNode::from)
        .collect()
}

fn serialize_summary(
    previous: &[ContextNode],
    current: &ContextNode,
    next: &[ContextNode],
    siblings: &[ContextNode],
    budget: usize,
) -> String {
    let payload = SummaryPayload {
        previous,
        current,
        next,
        siblings,
    };
    let encoded = serde_json::to_string(&payload).unwrap_or_default();
    truncate_chars(&encoded, budget)
}

fn truncate_chars(value: &str, budget: usize) -> String {
    match value.char_indices().nth(budget) {
        Some((byte_index, _)) => value[..byte_index].to_string(),
        None => value.to_string(),
    }
}
