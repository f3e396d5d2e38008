//! Context domain: graph context building, node processing state and generation.
//! Reads go through `GraphView` snapshots; writes go through an `ActiveView`.

pub mod builder;
pub mod generation;
pub mod processing;

pub use builder::{
    build_context, find_siblings, ContextNode, ContextRequest, DialogContext,
    DEFAULT_CONTEXT_BUDGET,
};
pub use generation::{
    run_generate, BulkExecutor, BulkOptions, BulkRunSummary, Dispatcher, ExecutorSettings,
    GenerateOutcome, GenerateRequest, GenerationMode, GenerationService, RegenerationPlan,
    RequestMode, RunMarkers,
};
pub use processing::{next_status, ProcessingTracker, StatusEvent};
