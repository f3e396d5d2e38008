//! Dialogen: context-aware text generation for branching dialog graphs.
//!
//! A dialog graph is a set of typed text nodes joined by directed edges. Dialogen
//! builds a context for a node from its surroundings, asks a generation backend for
//! new text, and can regenerate a node plus everything reachable from it in one
//! ordered bulk run with live progress.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod storage;
pub mod telemetry;
pub mod types;
