//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::parse::{Commands, ModeArg};
use crate::cli::presentation::{
    format_bulk_summary_text, format_context_json, format_event_line, format_plan_output,
    format_status_output,
};
use crate::config::{ConfigLoader, DialogenConfig};
use crate::context::builder::{build_context, ContextRequest};
use crate::context::generation::{
    run_generate, BulkExecutor, Dispatcher, GenerateOutcome, GenerateRequest, GenerationMode,
    GenerationService, RegenerationPlan,
};
use crate::error::ApiError;
use crate::graph::GraphStore;
use crate::provider::ProviderGenerationService;
use crate::registry::NodeTypeRegistry;
use crate::storage::{load_graph, save_graph};
use crate::telemetry::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Runtime context for CLI execution: graph path, loaded config and node-type registry.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    graph_path: PathBuf,
    config: DialogenConfig,
    registry: Arc<NodeTypeRegistry>,
}

impl RunContext {
    /// Create run context; a relative graph path resolves against the workspace root.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        graph_path: PathBuf,
    ) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(config, workspace_root.join(graph_path))
    }

    pub fn from_config(config: DialogenConfig, graph_path: PathBuf) -> Result<Self, ApiError> {
        let registry = Arc::new(config.registry()?);
        Ok(Self {
            graph_path,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &DialogenConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Context {
                node,
                isolate,
                siblings,
                next,
            } => {
                let view = load_graph(&self.graph_path)?;
                let mut request = ContextRequest::default()
                    .isolated(*isolate)
                    .with_siblings(*siblings)
                    .with_budget(self.config.generation.context_budget);
                if !next.is_empty() {
                    request = request.with_next_override(next.clone());
                }
                let context = build_context(node, &view, &request)
                    .ok_or_else(|| ApiError::NodeNotFound(node.clone()))?;
                format_context_json(&context)
            }
            Commands::Plan { start, format } => {
                let view = load_graph(&self.graph_path)?;
                let plan = RegenerationPlan::build(start, &view)?;
                format_plan_output(&plan, format)
            }
            Commands::Status { format } => {
                let view = load_graph(&self.graph_path)?;
                format_status_output(&view, format)
            }
            Commands::Generate {
                node,
                mode,
                prompt,
                system_prompt,
                isolate,
                model,
                next,
            } => {
                let mode = generation_mode(*mode, prompt.as_deref(), system_prompt.as_deref())?;
                let request = GenerateRequest::single(node.clone(), mode)
                    .isolated(*isolate)
                    .with_model(model.clone())
                    .with_next_override((!next.is_empty()).then(|| next.clone()));
                match self.run_with_graph(&request)? {
                    GenerateOutcome::Node { text, .. } => Ok(text),
                    GenerateOutcome::Bulk(summary) => Ok(format_bulk_summary_text(&summary)),
                }
            }
            Commands::Regenerate {
                start,
                ignore_connections,
                model,
                no_focus,
            } => {
                let mut request = GenerateRequest::regenerate_from(start.clone())
                    .isolated(*ignore_connections || self.config.generation.ignore_connections)
                    .with_model(model.clone());
                request.focus_on_complete = !no_focus && self.config.generation.focus_on_complete;
                match self.run_with_graph(&request)? {
                    GenerateOutcome::Bulk(summary) => Ok(format_bulk_summary_text(&summary)),
                    GenerateOutcome::Node { text, .. } => Ok(text),
                }
            }
        }
    }

    fn generation_service(&self) -> Result<Arc<dyn GenerationService>, ApiError> {
        let provider = self.config.provider.as_ref().ok_or_else(|| {
            ApiError::ProviderNotConfigured(
                "Add a [provider] section to config/config.toml".to_string(),
            )
        })?;
        let client = provider.create_client()?;
        info!(
            provider = client.provider_name(),
            model = client.model_name(),
            "Using generation provider"
        );
        Ok(Arc::new(
            ProviderGenerationService::new(client, Arc::clone(&self.registry))
                .with_options(provider.default_options.clone()),
        ))
    }

    /// Load the graph, run one request on a tokio runtime while printing live
    /// progress to stderr, then write the graph back (failed nodes included).
    fn run_with_graph(&self, request: &GenerateRequest) -> Result<GenerateOutcome, ApiError> {
        let service = self.generation_service()?;
        let store = Arc::new(GraphStore::new(load_graph(&self.graph_path)?));
        let (bus, receiver) = EventBus::new_pair();
        let executor = BulkExecutor::new(
            Dispatcher::new(service),
            store.clone(),
            Arc::clone(&self.registry),
            self.config.generation.executor_settings(),
        )
        .with_events(bus);

        let printer = thread::spawn(move || {
            for envelope in receiver {
                if let Some(line) = format_event_line(&envelope) {
                    eprintln!("{}", line);
                }
            }
        });

        let rt = tokio::runtime::Runtime::new().map_err(|e| {
            ApiError::ConfigError(format!("Failed to create tokio runtime: {}", e))
        })?;
        let outcome = rt.block_on(run_generate(&executor, request));

        // Dropping the executor drops the last sender and ends the printer loop.
        drop(executor);
        if printer.join().is_err() {
            debug!("Progress printer thread panicked");
        }

        save_graph(&self.graph_path, &store.root_snapshot())?;
        outcome
    }
}

fn generation_mode(
    mode: ModeArg,
    prompt: Option<&str>,
    system_prompt: Option<&str>,
) -> Result<GenerationMode, ApiError> {
    match mode {
        ModeArg::Recreate => Ok(GenerationMode::Recreate),
        ModeArg::Improve => Ok(GenerationMode::Improve),
        ModeArg::Custom => {
            let prompt = prompt.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                ApiError::ConfigError("--mode custom requires --prompt".to_string())
            })?;
            Ok(GenerationMode::Custom {
                prompt: prompt.to_string(),
                system_prompt: system_prompt.map(str::to_string),
            })
        }
    }
}
