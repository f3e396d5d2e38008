//! CLI parse: clap types for dialogen. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Dialogen CLI - context-aware text generation for dialog graphs
#[derive(Parser, Debug)]
#[command(name = "dialogen")]
#[command(about = "Context-aware text generation for branching dialog graphs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Graph file (JSON with `nodes` and `edges`)
    #[arg(long, default_value = "graph.json")]
    pub graph: PathBuf,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the generation context for a node as JSON
    Context {
        node: String,
        /// Ignore graph connections
        #[arg(long)]
        isolate: bool,
        /// Include same-type siblings
        #[arg(long)]
        siblings: bool,
        /// Replace the computed next list (repeatable)
        #[arg(long = "next")]
        next: Vec<String>,
    },
    /// Show the regeneration order starting at a node
    Plan {
        start: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate text for a single node and write the graph back
    Generate {
        node: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Recreate)]
        mode: ModeArg,
        /// User prompt for --mode custom
        #[arg(long)]
        prompt: Option<String>,
        /// System prompt for --mode custom
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        isolate: bool,
        /// Model override for this request
        #[arg(long)]
        model: Option<String>,
        /// Replace the computed next list (repeatable)
        #[arg(long = "next")]
        next: Vec<String>,
    },
    /// Regenerate a node and everything reachable from it
    Regenerate {
        start: String,
        /// Generate each node without graph context
        #[arg(long)]
        ignore_connections: bool,
        /// Model override for this run
        #[arg(long)]
        model: Option<String>,
        /// Do not request focus on the start node when done
        #[arg(long)]
        no_focus: bool,
    },
    /// Show node status for the graph
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Recreate,
    Improve,
    Custom,
}
