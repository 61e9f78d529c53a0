//! Prompt construction for single-shot processing and chat.

use crate::types::ChatMessage;

/// Instruction used when the caller supplies none (or a blank one).
pub const DEFAULT_INSTRUCTION: &str = "Convert this transcript into clear notes:";

/// Chat preamble used while the history is still empty.
pub const DEFAULT_CHAT_PREAMBLE: &str =
    "You are a helpful AI assistant. Respond concisely and accurately.";

/// Number of most recent history entries rendered into chat context.
pub const CHAT_CONTEXT_WINDOW: usize = 10;

pub const PROCESSING_STOP: [&str; 3] = ["\n\nYou:", "\nUser:", "\nQuestion:"];

pub const CHAT_STOP: [&str; 4] = ["\nUser:", "\n\n", "\nYou:", "\nQuestion:"];

/// `{system}\n\n{instruction}\n\nTranscript:\n{transcript}`
pub fn processing_prompt(system_prompt: &str, instruction: Option<&str>, transcript: &str) -> String {
    let instruction = instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);
    format!(
        "{}\n\n{}\n\nTranscript:\n{}",
        system_prompt.trim_end(),
        instruction,
        transcript
    )
}

/// Renders the last [`CHAT_CONTEXT_WINDOW`] entries as `Role: content` lines
/// under a `Conversation history:` header. Older entries are left out.
pub fn chat_context(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return DEFAULT_CHAT_PREAMBLE.to_string();
    }

    let recent = &history[history.len().saturating_sub(CHAT_CONTEXT_WINDOW)..];
    let mut lines = Vec::with_capacity(recent.len() + 1);
    lines.push("Conversation history:".to_string());
    lines.extend(recent.iter().map(ChatMessage::render));
    lines.join("\n")
}

/// `{context}\n\nUser: {message}\nAssistant:`
pub fn chat_prompt(context: &str, message: &str) -> String {
    format!("{}\n\nUser: {}\nAssistant:", context, message)
}
