//! CLI presentation: text and json formatters for command results and live events.

use crate::context::builder::DialogContext;
use crate::context::generation::{BulkRunSummary, RegenerationPlan};
use crate::error::{ApiError, FailureKind};
use crate::graph::{GraphView, ProcessingStatus};
use crate::telemetry::{EventEnvelope, LifecycleEvent, ProgressUpdate, RegenerationEvent};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to serialize output: {}", e)))
}

pub fn format_context_json(context: &DialogContext) -> Result<String, ApiError> {
    to_json(context)
}

pub fn format_plan_output(plan: &RegenerationPlan, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(plan);
    }
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Regeneration plan from {}", plan.start))
    );
    for (index, node_id) in plan.order.iter().enumerate() {
        out.push_str(&format!("  {:>3}. {}\n", index + 1, node_id));
    }
    out.push_str(&format!("\n{} node(s)", plan.len()));
    Ok(out)
}

fn styled_status(status: ProcessingStatus) -> String {
    match status {
        ProcessingStatus::Idle => status.as_str().green().to_string(),
        ProcessingStatus::Generating => status.as_str().yellow().to_string(),
        ProcessingStatus::Error => status.as_str().red().to_string(),
        ProcessingStatus::Timeout => status.as_str().magenta().to_string(),
    }
}

/// Node status table (comfy-table), or the nodes as JSON.
pub fn format_status_output(view: &GraphView, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&view.nodes);
    }
    let mut out = format!("{}\n\n", format_section_heading("Node status"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Node", "Type", "Status", "Error"]);
    for node in &view.nodes {
        table.add_row(vec![
            node.id.clone(),
            node.node_type.clone(),
            styled_status(node.status),
            node.error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    let failed = view
        .nodes
        .iter()
        .filter(|node| matches!(node.status, ProcessingStatus::Error | ProcessingStatus::Timeout))
        .count();
    out.push_str(&format!("{} node(s), {} failed", view.nodes.len(), failed));
    Ok(out)
}

/// One line per event for live progress on stderr. Percent updates render as a bar.
pub fn format_event_line(envelope: &EventEnvelope) -> Option<String> {
    match &envelope.event {
        RegenerationEvent::Lifecycle(LifecycleEvent::BulkStarted { start, total }) => Some(format!(
            "{} regenerating {} node(s) from {}",
            "start".cyan().bold(),
            total,
            start
        )),
        RegenerationEvent::Lifecycle(LifecycleEvent::BulkCompleted { count }) => Some(format!(
            "{} {} node(s) regenerated",
            "done".green().bold(),
            count
        )),
        RegenerationEvent::Lifecycle(LifecycleEvent::FocusRequested { .. }) => None,
        RegenerationEvent::Progress(ProgressUpdate::Percent { value }) => {
            let filled = usize::from(*value) / 5;
            Some(format!(
                "[{}{}] {:>3}%",
                "#".repeat(filled),
                "-".repeat(20 - filled),
                value
            ))
        }
        RegenerationEvent::Progress(ProgressUpdate::Message { text }) => {
            Some(format!("  {}", text.dimmed()))
        }
        RegenerationEvent::Progress(ProgressUpdate::NodeFailed {
            node_id,
            kind,
            message,
        }) => {
            let label = match kind {
                FailureKind::Timeout => "timeout".magenta().bold().to_string(),
                FailureKind::Failed => "failed".red().bold().to_string(),
            };
            Some(format!("{} {}: {}", label, node_id, message))
        }
        RegenerationEvent::Progress(ProgressUpdate::Finished { ok, summary }) => {
            if *ok {
                Some(format!("{} {}", "ok".green().bold(), summary))
            } else {
                Some(format!("{} {}", "error".red().bold(), summary))
            }
        }
    }
}

pub fn format_bulk_summary_text(summary: &BulkRunSummary) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Regeneration summary"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Planned", "Generated", "Failed", "Timeouts", "Skipped", "Missing"]);
    table.add_row(vec![
        summary.plan.len().to_string(),
        summary.generated.len().to_string(),
        summary.failed.len().to_string(),
        summary.timeouts().to_string(),
        summary.skipped.len().to_string(),
        summary.missing.len().to_string(),
    ]);
    out.push_str(&format!("{}\n", table));
    for failure in &summary.failed {
        out.push_str(&format!(
            "  {} [{}] {}\n",
            failure.node_id,
            failure.kind.as_str(),
            failure.message
        ));
    }
    out.trim_end().to_string()
}
