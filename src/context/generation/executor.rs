//! Bulk executor: regenerates every node of a plan, one at a time, in plan order.
//! Owns run markers, the pending-write buffer and event emission; context building
//! and backend calls stay in their own modules.

use crate::context::builder::{build_context, ContextRequest, DEFAULT_CONTEXT_BUDGET};
use crate::context::generation::dispatcher::{DispatchOptions, Dispatcher, GenerationMode};
use crate::context::generation::plan::{BulkRunSummary, NodeFailure, RegenerationPlan};
use crate::context::processing::ProcessingTracker;
use crate::error::{ApiError, DispatchError};
use crate::graph::{ActiveView, DialogNode, GraphView};
use crate::registry::NodeTypeRegistry;
use crate::telemetry::{
    new_run_id, percent_complete, EventBus, LifecycleEvent, ProgressUpdate, RegenerationEvent,
};
use crate::types::NodeID;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tunables for a bulk run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Buffered successes written back to the graph in one batch
    pub flush_threshold: usize,
    /// Pause between consecutive nodes
    pub inter_node_delay: Duration,
    pub context_budget: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            flush_threshold: 3,
            inter_node_delay: Duration::from_millis(250),
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }
}

/// Per-run options supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOptions {
    pub ignore_connections: bool,
    pub model_override: Option<String>,
    pub focus_on_complete: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            ignore_connections: false,
            model_override: None,
            focus_on_complete: true,
        }
    }
}

/// Observable state of the bulk run in flight, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMarkers {
    pub active: bool,
    /// Planned nodes, in order; empty when no run is active
    pub bulk_nodes: Vec<NodeID>,
    /// Node currently being generated
    pub processing: Option<NodeID>,
}

/// Successful generations not yet written back to the graph.
struct PendingWrites {
    texts: HashMap<NodeID, String>,
    threshold: usize,
}

impl PendingWrites {
    fn new(threshold: usize) -> Self {
        Self {
            texts: HashMap::new(),
            threshold: threshold.max(1),
        }
    }

    fn push(&mut self, node_id: NodeID, text: String) {
        self.texts.insert(node_id, text);
    }

    fn should_flush(&self) -> bool {
        self.texts.len() >= self.threshold
    }

    /// Overlay buffered text so later nodes see earlier results in their context.
    fn overlay(&self, view: &mut GraphView) {
        if self.texts.is_empty() {
            return;
        }
        for node in &mut view.nodes {
            if let Some(text) = self.texts.get(&node.id) {
                node.text = text.clone();
            }
        }
    }

    fn flush(&mut self, tracker: &ProcessingTracker<'_>) -> usize {
        if self.texts.is_empty() {
            return 0;
        }
        let written = tracker.succeed_batch(&self.texts);
        debug!(buffered = self.texts.len(), written, "Flushed pending node writes");
        self.texts.clear();
        written
    }
}

/// Marker ownership for one run. Dropping it before `finish`, as when the run's
/// future is cancelled, flushes buffered text, settles planned nodes still
/// generating and clears the markers.
struct ActiveRun<'a> {
    run_id: String,
    markers: &'a RwLock<RunMarkers>,
    tracker: ProcessingTracker<'a>,
    planned: HashSet<NodeID>,
    pending: PendingWrites,
    finished: bool,
}

impl<'a> ActiveRun<'a> {
    fn release(&mut self) -> usize {
        self.pending.flush(&self.tracker);
        let settled = self.tracker.settle(&self.planned);
        *self.markers.write() = RunMarkers::default();
        settled
    }

    fn finish(mut self) -> usize {
        self.finished = true;
        self.release()
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let settled = self.release();
        warn!(run_id = %self.run_id, settled, "Bulk regeneration abandoned before completion");
    }
}

/// Runs regeneration plans against the active view
pub struct BulkExecutor {
    dispatcher: Dispatcher,
    view: Arc<dyn ActiveView>,
    registry: Arc<NodeTypeRegistry>,
    events: Option<EventBus>,
    settings: ExecutorSettings,
    markers: Arc<RwLock<RunMarkers>>,
}

impl BulkExecutor {
    pub fn new(
        dispatcher: Dispatcher,
        view: Arc<dyn ActiveView>,
        registry: Arc<NodeTypeRegistry>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            dispatcher,
            view,
            registry,
            events: None,
            settings,
            markers: Arc::new(RwLock::new(RunMarkers::default())),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn markers(&self) -> RunMarkers {
        self.markers.read().clone()
    }

    /// Shared handle for observers that poll run state while a run is in flight.
    pub fn markers_handle(&self) -> Arc<RwLock<RunMarkers>> {
        Arc::clone(&self.markers)
    }

    pub fn is_running(&self) -> bool {
        self.markers.read().active
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn view(&self) -> &dyn ActiveView {
        self.view.as_ref()
    }

    pub(crate) fn emit(&self, run_id: &str, event: impl Into<RegenerationEvent>) {
        if let Some(events) = &self.events {
            events.emit(run_id, event);
        }
    }

    /// Execute `plan`. Per-node failures are recorded in the summary and never abort
    /// the run; only a missing start node or an overlapping run is an error.
    pub async fn execute(
        &self,
        plan: RegenerationPlan,
        options: &BulkOptions,
    ) -> Result<BulkRunSummary, ApiError> {
        plan.validate()?;
        let run_id = new_run_id();

        if !self.view.snapshot().contains(&plan.start) {
            error!(run_id, start = %plan.start, "Bulk regeneration start node not found");
            self.emit(
                &run_id,
                ProgressUpdate::Finished {
                    ok: false,
                    summary: format!("Node not found: {}", plan.start),
                },
            );
            return Err(ApiError::NodeNotFound(plan.start.clone()));
        }

        {
            let mut markers = self.markers.write();
            if markers.active {
                warn!(run_id, start = %plan.start, "Bulk regeneration already in progress");
                return Err(ApiError::RunInProgress);
            }
            *markers = RunMarkers {
                active: true,
                bulk_nodes: plan.order.clone(),
                processing: None,
            };
        }

        let total = plan.len();
        info!(run_id, plan_id = %plan.plan_id, start = %plan.start, total, "Bulk regeneration started");
        self.emit(
            &run_id,
            LifecycleEvent::BulkStarted {
                start: plan.start.clone(),
                total,
            },
        );

        let mut run = ActiveRun {
            run_id: run_id.clone(),
            markers: self.markers.as_ref(),
            tracker: ProcessingTracker::new(self.view.as_ref()),
            planned: plan.order.iter().cloned().collect(),
            pending: PendingWrites::new(self.settings.flush_threshold),
            finished: false,
        };
        let mut summary = BulkRunSummary::new(run_id.clone(), &plan);

        for (index, node_id) in plan.order.iter().enumerate() {
            let mut live = self.view.snapshot();
            run.pending.overlay(&mut live);

            match live.node(node_id).cloned() {
                Some(node) => {
                    self.regenerate_node(
                        &run.tracker,
                        &live,
                        &node,
                        options,
                        &mut run.pending,
                        &mut summary,
                    )
                    .await;
                }
                None => {
                    debug!(run_id, node_id = %node_id, "Planned node missing from live view");
                    summary.missing.push(node_id.clone());
                }
            }

            if run.pending.should_flush() {
                run.pending.flush(&run.tracker);
            }

            let completed = index + 1;
            self.emit(
                &run_id,
                ProgressUpdate::Percent {
                    value: percent_complete(completed, total),
                },
            );
            self.emit(
                &run_id,
                ProgressUpdate::Message {
                    text: format!("Regenerated {}/{}: {}", completed, total, node_id),
                },
            );

            if completed < total && !self.settings.inter_node_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_node_delay).await;
            }
        }

        let settled = run.finish();
        if settled > 0 {
            debug!(run_id, settled, "Reset nodes left generating");
        }

        if !summary.missing.is_empty() {
            warn!(run_id, missing = summary.missing.len(), "Planned nodes vanished during run");
        }
        info!(
            run_id,
            generated = summary.generated.len(),
            failed = summary.failed.len(),
            timeouts = summary.timeouts(),
            skipped = summary.skipped.len(),
            missing = summary.missing.len(),
            "Bulk regeneration completed"
        );

        self.emit(
            &run_id,
            LifecycleEvent::BulkCompleted {
                count: summary.generated.len(),
            },
        );
        if options.focus_on_complete {
            self.emit(
                &run_id,
                LifecycleEvent::FocusRequested {
                    node_id: plan.start.clone(),
                },
            );
        }
        self.emit(
            &run_id,
            ProgressUpdate::Finished {
                ok: summary.is_success(),
                summary: summary.summary_line(),
            },
        );

        Ok(summary)
    }

    async fn regenerate_node(
        &self,
        tracker: &ProcessingTracker<'_>,
        live: &GraphView,
        node: &DialogNode,
        options: &BulkOptions,
        pending: &mut PendingWrites,
        summary: &mut BulkRunSummary,
    ) {
        let run_id = summary.run_id.clone();
        if let Err(err) = tracker.start(&node.id) {
            self.record_failure(&run_id, summary, &node.id, DispatchError::from(err));
            return;
        }
        self.markers.write().processing = Some(node.id.clone());

        if self.registry.is_container(&node.node_type) {
            debug!(run_id, node_id = %node.id, node_type = %node.node_type, "Skipping container node");
            if let Err(err) = tracker.succeed(&node.id, None) {
                warn!(run_id, node_id = %node.id, error = %err, "Failed to reset container node");
            }
            summary.skipped.push(node.id.clone());
            return;
        }

        let request = ContextRequest::default()
            .isolated(options.ignore_connections)
            .with_siblings(true)
            .with_budget(self.settings.context_budget);
        let Some(context) = build_context(&node.id, live, &request) else {
            summary.missing.push(node.id.clone());
            return;
        };

        let dispatch_options = DispatchOptions {
            model_override: options.model_override.clone(),
            ignore_connections: options.ignore_connections,
        };
        match self
            .dispatcher
            .generate(&node.node_type, &context, &GenerationMode::Recreate, &dispatch_options)
            .await
        {
            Ok(text) => {
                pending.push(node.id.clone(), text);
                summary.generated.push(node.id.clone());
            }
            Err(err) => {
                if let Err(status_err) = tracker.fail(&node.id, &err) {
                    warn!(run_id, node_id = %node.id, error = %status_err, "Failed to record node failure");
                }
                self.record_failure(&run_id, summary, &node.id, err);
            }
        }
    }

    fn record_failure(
        &self,
        run_id: &str,
        summary: &mut BulkRunSummary,
        node_id: &str,
        err: DispatchError,
    ) {
        warn!(
            run_id,
            node_id,
            kind = err.kind.as_str(),
            error = %err.message,
            "Node regeneration failed"
        );
        self.emit(
            run_id,
            ProgressUpdate::NodeFailed {
                node_id: node_id.to_string(),
                kind: err.kind,
                message: err.message.clone(),
            },
        );
        summary.failed.push(NodeFailure {
            node_id: node_id.to_string(),
            kind: err.kind,
            message: err.message,
        });
    }
}
