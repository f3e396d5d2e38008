//! Node-type registry: explicitly constructed and passed to whoever needs it.
//!
//! Registration is idempotent. Registering a type name that already exists is a
//! no-op and reports `false`; the first registration wins.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_SUBGRAPH_TYPE: &str = "subgraph";

/// Description of a node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeSpec {
    pub type_name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Extra instruction appended to generation prompts for this type
    #[serde(default)]
    pub prompt_hint: Option<String>,
    /// Containers hold a nested graph and are never generated directly
    #[serde(default)]
    pub container: bool,
}

impl NodeTypeSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            label: None,
            prompt_hint: None,
            container: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_prompt_hint(mut self, hint: impl Into<String>) -> Self {
        self.prompt_hint = Some(hint.into());
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.type_name.trim().is_empty() {
            return Err("Node type name cannot be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    types: HashMap<String, NodeTypeSpec>,
    subgraph_type: String,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_SUBGRAPH_TYPE)
    }
}

impl NodeTypeRegistry {
    /// Empty registry; `subgraph_type` is always treated as a container.
    pub fn new(subgraph_type: impl Into<String>) -> Self {
        Self {
            types: HashMap::new(),
            subgraph_type: subgraph_type.into(),
        }
    }

    /// Registry preloaded with the built-in dialog node kinds.
    pub fn with_defaults(subgraph_type: impl Into<String>) -> Self {
        let mut registry = Self::new(subgraph_type);
        registry.register(
            NodeTypeSpec::new("dialog")
                .with_label("Dialog")
                .with_prompt_hint("Write a single spoken line in the speaker's voice."),
        );
        registry.register(
            NodeTypeSpec::new("choice")
                .with_label("Choice")
                .with_prompt_hint("Write a short player-facing choice, under 12 words."),
        );
        registry.register(
            NodeTypeSpec::new("narration")
                .with_label("Narration")
                .with_prompt_hint("Write brief scene narration in present tense."),
        );
        let container = registry.subgraph_type.clone();
        registry.register(NodeTypeSpec::new(container).with_label("Subgraph").container());
        registry
    }

    /// Register a node type. Returns `false` when the name is already registered.
    pub fn register(&mut self, spec: NodeTypeSpec) -> bool {
        if self.types.contains_key(&spec.type_name) {
            debug!(node_type = %spec.type_name, "Node type already registered");
            return false;
        }
        self.types.insert(spec.type_name.clone(), spec);
        true
    }

    /// Register every spec, validating each first.
    pub fn register_all<I>(&mut self, specs: I) -> Result<usize, ApiError>
    where
        I: IntoIterator<Item = NodeTypeSpec>,
    {
        let mut added = 0usize;
        for spec in specs {
            spec.validate().map_err(ApiError::ConfigError)?;
            if self.register(spec) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn get(&self, type_name: &str) -> Option<&NodeTypeSpec> {
        self.types.get(type_name)
    }

    pub fn is_container(&self, type_name: &str) -> bool {
        type_name == self.subgraph_type
            || self.types.get(type_name).map(|spec| spec.container).unwrap_or(false)
    }

    pub fn prompt_hint(&self, type_name: &str) -> Option<&str> {
        self.types
            .get(type_name)
            .and_then(|spec| spec.prompt_hint.as_deref())
    }

    pub fn subgraph_type(&self) -> &str {
        &self.subgraph_type
    }

    pub fn list_all(&self) -> Vec<&NodeTypeSpec> {
        let mut specs: Vec<&NodeTypeSpec> = self.types.values().collect();
        specs.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        specs
    }
}
