//! Configuration System
//!
//! Layered configuration: merge-policy defaults, the global config file, workspace
//! config files, then `DIALOGEN__*` environment variables. Tests included.

use crate::context::generation::ExecutorSettings;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::registry::{NodeTypeRegistry, NodeTypeSpec, DEFAULT_SUBGRAPH_TYPE};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use crate::provider::{ProviderConfig, ProviderType};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogenConfig {
    /// Generation backend; commands that generate text require it
    #[serde(default)]
    pub provider: Option<ProviderConfig>,

    #[serde(default)]
    pub generation: GenerationSettings,

    /// Node types registered on top of the built-in ones
    #[serde(default)]
    pub node_types: Vec<NodeTypeSpec>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation and bulk-run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Buffered successes written back in one batch
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    #[serde(default = "default_inter_node_delay_ms")]
    pub inter_node_delay_ms: u64,

    /// Character budget for the serialized context summary
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Default for bulk runs when the caller does not choose
    #[serde(default)]
    pub ignore_connections: bool,

    /// Ask the UI to focus the start node when a bulk run ends
    #[serde(default = "default_true")]
    pub focus_on_complete: bool,

    /// Node type treated as a container and never generated
    #[serde(default = "default_subgraph_type")]
    pub subgraph_type: String,
}

fn default_flush_threshold() -> usize {
    3
}

fn default_inter_node_delay_ms() -> u64 {
    250
}

fn default_context_budget() -> usize {
    crate::context::builder::DEFAULT_CONTEXT_BUDGET
}

fn default_true() -> bool {
    true
}

fn default_subgraph_type() -> String {
    DEFAULT_SUBGRAPH_TYPE.to_string()
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            inter_node_delay_ms: default_inter_node_delay_ms(),
            context_budget: default_context_budget(),
            ignore_connections: false,
            focus_on_complete: default_true(),
            subgraph_type: default_subgraph_type(),
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.flush_threshold == 0 {
            return Err("flush_threshold must be at least 1".to_string());
        }
        if self.context_budget == 0 {
            return Err("context_budget must be at least 1".to_string());
        }
        if self.subgraph_type.trim().is_empty() {
            return Err("subgraph_type cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            flush_threshold: self.flush_threshold,
            inter_node_delay: Duration::from_millis(self.inter_node_delay_ms),
            context_budget: self.context_budget,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Generation: {0}")]
    Generation(String),
    #[error("Provider: {0}")]
    Provider(String),
    #[error("Node type '{0}': {1}")]
    NodeType(String, String),
}

impl DialogenConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.generation.validate() {
            errors.push(ValidationError::Generation(e));
        }
        if let Some(provider) = &self.provider {
            if let Err(provider_errors) = provider.validate() {
                errors.extend(provider_errors.into_iter().map(ValidationError::Provider));
            }
        }
        for spec in &self.node_types {
            if let Err(e) = spec.validate() {
                errors.push(ValidationError::NodeType(spec.type_name.clone(), e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every error into one `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Built-in node types plus the configured ones.
    pub fn registry(&self) -> Result<NodeTypeRegistry, ApiError> {
        let mut registry = NodeTypeRegistry::with_defaults(self.generation.subgraph_type.clone());
        registry.register_all(self.node_types.iter().cloned())?;
        Ok(registry)
    }
}

/// Loads `DialogenConfig` from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load for a workspace: defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<DialogenConfig, ApiError> {
        Self::load_layered(
            workspace_root,
            Self::xdg_config_path().as_deref(),
            &sources::workspace_file::env_name(),
        )
    }

    /// Load a single explicit file over the defaults, then the environment.
    pub fn load_from_file(path: &Path) -> Result<DialogenConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    /// Layered load with explicit global path and environment name.
    pub fn load_layered(
        workspace_root: &Path,
        global_path: Option<&Path>,
        env_name: &str,
    ) -> Result<DialogenConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder, global_path);
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root, env_name);
        Self::finish(builder)
    }

    pub fn xdg_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<DialogenConfig, ApiError> {
        let config: DialogenConfig = builder
            .add_source(
                Environment::with_prefix("DIALOGEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.ensure_valid()?;
        Ok(config)
    }
}
