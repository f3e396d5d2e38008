//! Chat prompt assembly for dialog generation.

use crate::context::builder::DialogContext;
use crate::provider::ChatMessage;

const BASE_SYSTEM_PROMPT: &str = "You write lines for a branching dialog graph. \
Reply with the node text only: no quotes, no speaker labels, no commentary.";

fn system_prompt(node_type: &str, hint: Option<&str>) -> String {
    let mut prompt = format!("{}\nNode type: {}.", BASE_SYSTEM_PROMPT, node_type);
    if let Some(hint) = hint {
        prompt.push('\n');
        prompt.push_str(hint);
    }
    prompt
}

/// The connection block shown to the model. Isolated requests see only the node itself.
fn context_block(context: &DialogContext, ignore_connections: bool) -> String {
    if ignore_connections || context.is_empty() {
        format!(
            "This node stands alone. Current text: {:?}",
            context.current.text
        )
    } else {
        format!(
            "Surrounding dialog as JSON (previous nodes nearest first, then the current node, \
             then what follows):\n{}",
            context.summary
        )
    }
}

pub fn generate_messages(
    node_type: &str,
    hint: Option<&str>,
    context: &DialogContext,
    raw_mode: &str,
    ignore_connections: bool,
) -> Vec<ChatMessage> {
    let instruction = match raw_mode {
        "recreate" => "Write a fresh alternative for the current node. Do not reuse its wording.",
        _ => "Write the text for the current node.",
    };
    vec![
        ChatMessage::system(system_prompt(node_type, hint)),
        ChatMessage::user(format!(
            "{}\n\n{}",
            context_block(context, ignore_connections),
            instruction
        )),
    ]
}

pub fn improve_messages(
    node_type: &str,
    hint: Option<&str>,
    context: &DialogContext,
    current_text: &str,
    ignore_connections: bool,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(node_type, hint)),
        ChatMessage::user(format!(
            "{}\n\nImprove this text while keeping its meaning and voice:\n{}",
            context_block(context, ignore_connections),
            current_text
        )),
    ]
}

/// A caller-supplied system prompt replaces the default one entirely.
pub fn custom_messages(
    node_type: &str,
    hint: Option<&str>,
    context: &DialogContext,
    user_prompt: &str,
    system: Option<&str>,
    ignore_connections: bool,
) -> Vec<ChatMessage> {
    let system = match system {
        Some(system) => system.to_string(),
        None => system_prompt(node_type, hint),
    };
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "{}\n\n{}",
            context_block(context, ignore_connections),
            user_prompt
        )),
    ]
}
