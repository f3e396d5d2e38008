//! Workspace config file source: config/config.toml and config/{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, File};
use std::path::Path;

pub const DEFAULT_ENV: &str = "development";

/// Name of the active environment, from DIALOGEN_ENV.
pub fn env_name() -> String {
    std::env::var("DIALOGEN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string())
}

/// Add workspace config files to builder.
/// Precedence: config/config.toml (base) then config/{env}.toml (env-specific).
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
    env_name: &str,
) -> ConfigBuilder<DefaultState> {
    let config_dir = workspace_root.join("config");
    for path in [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ] {
        if path.exists() {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }
    }
    builder
}
