//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. The same
//! estimate drives the compaction trigger and the summary size cap, so the
//! two always agree with each other.

use tinyreact_core::message::Message;

/// Per-message overhead for role name, delimiters and wire formatting.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead
/// and any tool calls it carries.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments))
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate what a request would cost: system prompt plus history.
pub fn estimate_context_tokens(system_prompt: &str, history: &[Message]) -> usize {
    let prompt = if system_prompt.is_empty() {
        0
    } else {
        MESSAGE_OVERHEAD + estimate_tokens(system_prompt)
    };
    prompt + estimate_messages_tokens(history)
}
