//! Single generate entry point: resolve the node, then either dispatch once or plan
//! and execute a bulk run. CLI and other callers go through here only.

use crate::context::builder::{build_context, ContextRequest};
use crate::context::generation::dispatcher::{DispatchOptions, GenerationMode};
use crate::context::generation::executor::{BulkExecutor, BulkOptions};
use crate::context::generation::plan::{BulkRunSummary, RegenerationPlan};
use crate::context::processing::ProcessingTracker;
use crate::error::ApiError;
use crate::telemetry::{new_run_id, ProgressUpdate};
use crate::types::NodeID;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// What a generation request asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestMode {
    /// One backend call for the focal node
    Single { mode: GenerationMode },
    /// Regenerate the focal node and everything reachable from it
    RegenerateFromHere,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub node_id: NodeID,
    pub mode: RequestMode,
    /// Build an empty context regardless of topology
    pub isolate: bool,
    pub model_override: Option<String>,
    /// Replacement for the computed next list (single-node requests only)
    pub next_override: Option<Vec<NodeID>>,
    pub focus_on_complete: bool,
}

impl GenerateRequest {
    pub fn single(node_id: impl Into<NodeID>, mode: GenerationMode) -> Self {
        Self {
            node_id: node_id.into(),
            mode: RequestMode::Single { mode },
            isolate: false,
            model_override: None,
            next_override: None,
            focus_on_complete: true,
        }
    }

    pub fn regenerate_from(node_id: impl Into<NodeID>) -> Self {
        Self {
            node_id: node_id.into(),
            mode: RequestMode::RegenerateFromHere,
            isolate: false,
            model_override: None,
            next_override: None,
            focus_on_complete: true,
        }
    }

    pub fn isolated(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    pub fn with_next_override(mut self, next: Option<Vec<NodeID>>) -> Self {
        self.next_override = next;
        self
    }
}

#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Node { node_id: NodeID, text: String },
    Bulk(BulkRunSummary),
}

/// Run one generation request against the executor's active view.
///
/// Single-node failures update the node status first, then surface as `Err`.
/// Bulk runs only fail as a whole when the start node is missing or another run
/// is active; per-node failures are reported in the summary.
pub async fn run_generate(
    executor: &BulkExecutor,
    request: &GenerateRequest,
) -> Result<GenerateOutcome, ApiError> {
    match &request.mode {
        RequestMode::Single { mode } => {
            let text = generate_node(executor, request, mode).await?;
            Ok(GenerateOutcome::Node {
                node_id: request.node_id.clone(),
                text,
            })
        }
        RequestMode::RegenerateFromHere => {
            let snapshot = executor.view().snapshot();
            let plan = match RegenerationPlan::build(&request.node_id, &snapshot) {
                Ok(plan) => plan,
                Err(err) => {
                    error!(node_id = %request.node_id, error = %err, "Cannot plan bulk regeneration");
                    executor.emit(
                        &new_run_id(),
                        ProgressUpdate::Finished {
                            ok: false,
                            summary: err.to_string(),
                        },
                    );
                    return Err(err);
                }
            };
            let options = BulkOptions {
                ignore_connections: request.isolate,
                model_override: request.model_override.clone(),
                focus_on_complete: request.focus_on_complete,
            };
            executor
                .execute(plan, &options)
                .await
                .map(GenerateOutcome::Bulk)
        }
    }
}

async fn generate_node(
    executor: &BulkExecutor,
    request: &GenerateRequest,
    mode: &GenerationMode,
) -> Result<String, ApiError> {
    let run_id = new_run_id();
    let node_id = request.node_id.as_str();
    let snapshot = executor.view().snapshot();

    let mut context_request = ContextRequest::default()
        .isolated(request.isolate)
        .with_siblings(true)
        .with_budget(executor.settings().context_budget);
    if let Some(next) = &request.next_override {
        context_request = context_request.with_next_override(next.clone());
    }

    let (Some(node), Some(context)) = (
        snapshot.node(node_id),
        build_context(node_id, &snapshot, &context_request),
    ) else {
        let err = ApiError::NodeNotFound(node_id.to_string());
        error!(run_id, node_id, "Generation target not found");
        executor.emit(
            &run_id,
            ProgressUpdate::Finished {
                ok: false,
                summary: err.to_string(),
            },
        );
        return Err(err);
    };

    let tracker = ProcessingTracker::new(executor.view());
    tracker.start(node_id)?;
    info!(run_id, node_id, mode = mode.as_str(), "Generating node");

    let options = DispatchOptions {
        model_override: request.model_override.clone(),
        ignore_connections: request.isolate,
    };
    match executor
        .dispatcher()
        .generate(&node.node_type, &context, mode, &options)
        .await
    {
        Ok(text) => {
            tracker.succeed(node_id, Some(&text))?;
            executor.emit(
                &run_id,
                ProgressUpdate::Finished {
                    ok: true,
                    summary: format!("Generated node {}", node_id),
                },
            );
            Ok(text)
        }
        Err(err) => {
            if let Err(status_err) = tracker.fail(node_id, &err) {
                warn!(run_id, node_id, error = %status_err, "Failed to record node failure");
            }
            warn!(run_id, node_id, kind = err.kind.as_str(), error = %err.message, "Node generation failed");
            executor.emit(
                &run_id,
                ProgressUpdate::NodeFailed {
                    node_id: node_id.to_string(),
                    kind: err.kind,
                    message: err.message.clone(),
                },
            );
            executor.emit(
                &run_id,
                ProgressUpdate::Finished {
                    ok: false,
                    summary: err.message.clone(),
                },
            );
            Err(ApiError::from(err))
        }
    }
}
