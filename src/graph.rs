//! Dialog Graph Model
//!
//! Nodes, edges, and the ordered graph view that context building and
//! regeneration operate on. Edges may form cycles; nothing here assumes a DAG.

pub mod store;

pub use store::{ActiveView, GraphStore, ScopedView};

use crate::error::ApiError;
use crate::types::NodeID;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-node processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Generating,
    Error,
    Timeout,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Idle => "idle",
            ProcessingStatus::Generating => "generating",
            ProcessingStatus::Error => "error",
            ProcessingStatus::Timeout => "timeout",
        }
    }
}

/// Node metadata bag. Tags are only used when serializing context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A dialog node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogNode {
    pub id: NodeID,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl DialogNode {
    pub fn new(id: impl Into<NodeID>, node_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            text: text.into(),
            status: ProcessingStatus::Idle,
            error: None,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Directed dialog transition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeID,
    pub target: NodeID,
}

impl Edge {
    pub fn new(source: impl Into<NodeID>, target: impl Into<NodeID>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Ordered nodes plus ordered edges: either the full graph or a scoped subview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    #[serde(default)]
    pub nodes: Vec<DialogNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphView {
    /// Build a view, rejecting duplicate node ids.
    pub fn new(nodes: Vec<DialogNode>, edges: Vec<Edge>) -> Result<Self, ApiError> {
        let view = Self { nodes, edges };
        view.validate()?;
        Ok(view)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ApiError::DuplicateNode(node.id.clone()));
            }
        }
        Ok(())
    }

    pub fn node(&self, node_id: &str) -> Option<&DialogNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }

    /// Edges whose target is `node_id`, in edge order.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.target == node_id)
    }

    /// Edges whose source is `node_id`, in edge order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == node_id)
    }

    /// Direct parent ids of `node_id`, deduplicated, in edge order.
    pub fn parents_of<'a>(&'a self, node_id: &'a str) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.incoming(node_id)
            .map(|edge| edge.source.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }
}
