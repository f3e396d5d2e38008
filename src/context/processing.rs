//! Node processing state.
//!
//! `idle|error|timeout --start--> generating`, `generating --succeed--> idle`,
//! `generating --fail--> error|timeout`. Every write goes through the active view,
//! which mirrors it into the scoped subview when one is active.

use crate::error::{ApiError, DispatchError, FailureKind};
use crate::graph::{ActiveView, DialogNode, ProcessingStatus};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Start,
    Succeed,
    Fail(FailureKind),
}

impl StatusEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusEvent::Start => "start",
            StatusEvent::Succeed => "succeed",
            StatusEvent::Fail(_) => "fail",
        }
    }
}

/// Next status for `event`, or `None` when the transition is not defined.
pub fn next_status(from: ProcessingStatus, event: StatusEvent) -> Option<ProcessingStatus> {
    use ProcessingStatus::*;
    match (from, event) {
        (Idle | Error | Timeout, StatusEvent::Start) => Some(Generating),
        (Generating, StatusEvent::Succeed) => Some(Idle),
        (Generating, StatusEvent::Fail(kind)) => Some(kind.status()),
        _ => None,
    }
}

/// Applies status transitions for nodes in an active view
pub struct ProcessingTracker<'a> {
    view: &'a dyn ActiveView,
}

impl<'a> ProcessingTracker<'a> {
    pub fn new(view: &'a dyn ActiveView) -> Self {
        Self { view }
    }

    /// Enter `generating`, clearing any previous error.
    pub fn start(&self, node_id: &str) -> Result<(), ApiError> {
        self.transition(node_id, StatusEvent::Start, |node| DialogNode {
            status: ProcessingStatus::Generating,
            error: None,
            ..node.clone()
        })
    }

    /// Return to `idle`, replacing the node text when `text` is given.
    pub fn succeed(&self, node_id: &str, text: Option<&str>) -> Result<(), ApiError> {
        self.transition(node_id, StatusEvent::Succeed, |node| DialogNode {
            text: text.map(str::to_string).unwrap_or_else(|| node.text.clone()),
            status: ProcessingStatus::Idle,
            error: None,
            ..node.clone()
        })
    }

    /// Record a classified dispatch failure, keeping the raw message.
    pub fn fail(&self, node_id: &str, err: &DispatchError) -> Result<(), ApiError> {
        self.transition(node_id, StatusEvent::Fail(err.kind), |node| DialogNode {
            status: err.kind.status(),
            error: Some(err.message.clone()),
            ..node.clone()
        })
    }

    /// Apply buffered text for many nodes in a single graph write.
    ///
    /// Nodes still `generating` return to `idle`; any other status is left alone
    /// and only the text is replaced (last write wins).
    pub fn succeed_batch(&self, texts: &HashMap<String, String>) -> usize {
        if texts.is_empty() {
            return 0;
        }
        self.view.update_nodes(&|node: &DialogNode| {
            texts.get(&node.id).map(|text| {
                let generating = node.status == ProcessingStatus::Generating;
                DialogNode {
                    text: text.clone(),
                    status: if generating {
                        ProcessingStatus::Idle
                    } else {
                        node.status
                    },
                    error: if generating { None } else { node.error.clone() },
                    ..node.clone()
                }
            })
        })
    }

    /// Move any of `node_ids` still marked `generating` back to `idle`.
    ///
    /// Used at the end of a bulk run; terminal `error`/`timeout` states are kept.
    pub fn settle(&self, node_ids: &HashSet<String>) -> usize {
        self.view.update_nodes(&|node: &DialogNode| {
            (node_ids.contains(&node.id) && node.status == ProcessingStatus::Generating).then(
                || DialogNode {
                    status: ProcessingStatus::Idle,
                    error: None,
                    ..node.clone()
                },
            )
        })
    }

    pub fn status_of(&self, node_id: &str) -> Option<ProcessingStatus> {
        self.view.snapshot().node(node_id).map(|node| node.status)
    }

    fn transition<F>(&self, node_id: &str, event: StatusEvent, apply: F) -> Result<(), ApiError>
    where
        F: Fn(&DialogNode) -> DialogNode + Send + Sync,
    {
        let from = self
            .status_of(node_id)
            .ok_or_else(|| ApiError::NodeNotFound(node_id.to_string()))?;
        let to = next_status(from, event).ok_or_else(|| ApiError::InvalidTransition {
            node_id: node_id.to_string(),
            from,
            event: event.as_str(),
        })?;
        self.view
            .update_nodes(&|node: &DialogNode| (node.id == node_id).then(|| apply(node)));
        debug!(node_id, from = from.as_str(), to = to.as_str(), "Node status transition");
        Ok(())
    }
}
