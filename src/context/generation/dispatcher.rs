//! Generation dispatcher: one call into the generation service per request.
//!
//! Backend errors are classified exactly once here, into a `DispatchError` whose
//! `kind` tells callers whether the node ends in `timeout` or `error`. No retries.

use crate::context::builder::DialogContext;
use crate::error::{ApiError, DispatchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Raw backend mode used for fresh alternatives
pub const RECREATE_MODE: &str = "recreate";

/// Backend operation for a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerationMode {
    /// Fresh alternative text
    Recreate,
    /// Refine the node's current text
    Improve,
    /// Free-form user prompt with an optional system prompt
    Custom {
        prompt: String,
        #[serde(default)]
        system_prompt: Option<String>,
    },
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Recreate => "recreate",
            GenerationMode::Improve => "improve",
            GenerationMode::Custom { .. } => "custom",
        }
    }
}

/// Text-generation backend
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_dialog(
        &self,
        node_type: &str,
        context: &DialogContext,
        raw_mode: &str,
        model_override: Option<&str>,
        ignore_connections: bool,
    ) -> Result<String, ApiError>;

    async fn improve_dialog(
        &self,
        node_type: &str,
        context: &DialogContext,
        current_text: &str,
        ignore_connections: bool,
    ) -> Result<String, ApiError>;

    async fn generate_with_custom_prompt(
        &self,
        node_type: &str,
        context: &DialogContext,
        user_prompt: &str,
        system_prompt: Option<&str>,
        ignore_connections: bool,
    ) -> Result<String, ApiError>;
}

/// Per-call dispatch options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub model_override: Option<String>,
    pub ignore_connections: bool,
}

#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn GenerationService>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Generate text for one node. The returned text is trimmed; empty output is a failure.
    pub async fn generate(
        &self,
        node_type: &str,
        context: &DialogContext,
        mode: &GenerationMode,
        options: &DispatchOptions,
    ) -> Result<String, DispatchError> {
        debug!(
            node_id = %context.current.id,
            node_type,
            mode = mode.as_str(),
            "Dispatching generation request"
        );
        let outcome = match mode {
            GenerationMode::Recreate => {
                self.service
                    .generate_dialog(
                        node_type,
                        context,
                        RECREATE_MODE,
                        options.model_override.as_deref(),
                        options.ignore_connections,
                    )
                    .await
            }
            GenerationMode::Improve => {
                self.service
                    .improve_dialog(
                        node_type,
                        context,
                        &context.current.text,
                        options.ignore_connections,
                    )
                    .await
            }
            GenerationMode::Custom {
                prompt,
                system_prompt,
            } => {
                self.service
                    .generate_with_custom_prompt(
                        node_type,
                        context,
                        prompt,
                        system_prompt.as_deref(),
                        options.ignore_connections,
                    )
                    .await
            }
        };

        let text = outcome.map_err(DispatchError::from)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DispatchError::from_message(
                "Generation service returned empty text",
            ));
        }
        Ok(trimmed.to_string())
    }
}
