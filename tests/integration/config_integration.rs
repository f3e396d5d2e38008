//! Layered configuration feeding the registry, executor settings and provider.

use dialogen::config::{ConfigLoader, ProviderType};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn workspace_config_drives_runtime_settings() {
    let temp_dir = TempDir::new().unwrap();
    write(
        &temp_dir.path().join("config/config.toml"),
        r#"
[provider]
provider_type = "local"
model = "mistral"
endpoint = "http://127.0.0.1:8080/v1"

[generation]
flush_threshold = 2
inter_node_delay_ms = 0
subgraph_type = "scene"

[[node_types]]
type_name = "bark"
prompt_hint = "One short exclamation."

[logging]
level = "debug"
format = "json"
"#,
    );

    let config = ConfigLoader::load_layered(temp_dir.path(), None, "development").unwrap();

    let settings = config.generation.executor_settings();
    assert_eq!(settings.flush_threshold, 2);
    assert_eq!(settings.inter_node_delay, Duration::ZERO);
    assert_eq!(settings.context_budget, 2000);

    let registry = config.registry().unwrap();
    assert!(registry.is_container("scene"));
    assert!(!registry.is_container("subgraph"));
    assert_eq!(registry.prompt_hint("bark"), Some("One short exclamation."));
    assert!(registry.get("dialog").is_some());

    let provider = config.provider.unwrap();
    assert_eq!(provider.provider_type, ProviderType::LocalCustom);
    let client = provider.create_client().unwrap();
    assert_eq!(client.model_name(), "mistral");

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn environment_file_overrides_base_file() {
    let temp_dir = TempDir::new().unwrap();
    write(
        &temp_dir.path().join("config/config.toml"),
        "[generation]\ncontext_budget = 500\nignore_connections = false\n",
    );
    write(
        &temp_dir.path().join("config/production.toml"),
        "[generation]\nignore_connections = true\n",
    );

    let development = ConfigLoader::load_layered(temp_dir.path(), None, "development").unwrap();
    assert!(!development.generation.ignore_connections);

    let production = ConfigLoader::load_layered(temp_dir.path(), None, "production").unwrap();
    assert!(production.generation.ignore_connections);
    assert_eq!(production.generation.context_budget, 500);
}

#[test]
fn invalid_provider_fails_load() {
    let temp_dir = TempDir::new().unwrap();
    write(
        &temp_dir.path().join("config/config.toml"),
        "[provider]\nprovider_type = \"local\"\nmodel = \"mistral\"\n",
    );
    let err = ConfigLoader::load_layered(temp_dir.path(), None, "development").unwrap_err();
    assert!(err.to_string().contains("requires an endpoint"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}
