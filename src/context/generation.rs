//! Node generation: dispatch for one node, plan and executor for bulk runs,
//! and the single `run_generate` entry point that chooses between them.

pub mod dispatcher;
pub mod executor;
pub mod plan;
pub mod run;

pub use dispatcher::{DispatchOptions, Dispatcher, GenerationMode, GenerationService};
pub use executor::{BulkExecutor, BulkOptions, ExecutorSettings, RunMarkers};
pub use plan::{traversal_order, BulkRunSummary, NodeFailure, RegenerationPlan};
pub use run::{run_generate, GenerateOutcome, GenerateRequest, RequestMode};
