//! Dialogen CLI Binary
//!
//! Command-line interface for dialog graph generation.

use anyhow::Context;
use clap::Parser;
use dialogen::cli::{Cli, RunContext};
use dialogen::config::ConfigLoader;
use dialogen::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    if let Err(e) = run() {
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;
    info!("Dialogen CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.graph.clone())
        .map_err(|e| {
            error!("Error initializing workspace: {}", e);
            anyhow::anyhow!(dialogen::cli::map_error(&e))
        })?;

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(anyhow::anyhow!(dialogen::cli::map_error(&e)))
        }
    }
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults; the
/// DIALOGEN_LOG* environment variables are applied last by `init_logging`.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }

    config
}
