//! Merge rules: defaults first, then files, then environment. Later sources win key by key.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("generation.flush_threshold", 3)?
        .set_default("generation.inter_node_delay_ms", 250)?
        .set_default("generation.context_budget", 2000)?
        .set_default("generation.ignore_connections", false)?
        .set_default("generation.focus_on_complete", true)?
        .set_default("generation.subgraph_type", "subgraph")
}
