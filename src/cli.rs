//! CLI domain: parse, route and presentation only.
//! No domain orchestration; a single route table dispatches to domain services.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands, ModeArg};
pub use presentation::{
    format_bulk_summary_text, format_context_json, format_event_line, format_plan_output,
    format_section_heading, format_status_output,
};
pub use route::RunContext;

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    e.to_string()
}
