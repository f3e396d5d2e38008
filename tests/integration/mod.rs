//! Integration tests for dialog graph generation

mod bulk_regeneration;
mod config_integration;
mod context_builder;
mod single_generation;
