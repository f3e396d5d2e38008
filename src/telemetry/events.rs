//! Event schema for regeneration telemetry.
//!
//! Lifecycle events are the fixed signal set UIs react to; progress updates carry
//! percentages, messages, per-node failures and the terminal summary.

use crate::error::FailureKind;
use crate::types::NodeID;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    BulkStarted { start: NodeID, total: usize },
    BulkCompleted { count: usize },
    FocusRequested { node_id: NodeID },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressUpdate {
    Percent { value: u8 },
    Message { text: String },
    NodeFailed {
        node_id: NodeID,
        kind: FailureKind,
        message: String,
    },
    Finished { ok: bool, summary: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "event", rename_all = "snake_case")]
pub enum RegenerationEvent {
    Lifecycle(LifecycleEvent),
    Progress(ProgressUpdate),
}

impl From<LifecycleEvent> for RegenerationEvent {
    fn from(event: LifecycleEvent) -> Self {
        RegenerationEvent::Lifecycle(event)
    }
}

impl From<ProgressUpdate> for RegenerationEvent {
    fn from(update: ProgressUpdate) -> Self {
        RegenerationEvent::Progress(update)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub ts: String,
    pub run: String,
    pub seq: u64,
    pub event: RegenerationEvent,
}

impl EventEnvelope {
    pub fn with_now(run: impl Into<String>, seq: u64, event: RegenerationEvent) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            run: run.into(),
            seq,
            event,
        }
    }
}

/// `round(completed / total * 100)`, clamped to 100. An empty run reports 100.
pub fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
