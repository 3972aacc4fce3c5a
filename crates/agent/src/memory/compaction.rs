//! Pure compaction helpers: where to split, how to render, how to cap.
//!
//! Kept free of I/O so the split and budget rules can be tested directly.

use tinyreact_core::message::{Message, Role};

use super::token::{MESSAGE_OVERHEAD, estimate_messages_tokens, estimate_tokens};

/// Prefix of the system message that replaces a compacted range.
pub const SUMMARY_HEADER: &str = "[Conversation Summary]\n";

/// Instructions for the summarisation call.
pub const SUMMARY_INSTRUCTIONS: &str = concat!(
    "You compress agent conversations. Summarise the transcript you are given ",
    "into a compact set of facts: the user's goals, decisions made, tool results ",
    "that matter, and open questions. Fold any earlier summary into the new one. ",
    "Write plain prose or short bullet points, no preamble."
);

/// Longest excerpt of a single message used in transcripts and extractive summaries.
const EXCERPT_CHARS: usize = 600;

/// Index splitting `history` into `[..split]` (compacted) and `[split..]` (kept).
///
/// The kept window holds at least `keep_recent` messages and never starts on
/// a tool result: it grows backwards until it includes the assistant message
/// that issued the call. Returns 0 when nothing can be compacted.
pub fn split_point(history: &[Message], keep_recent: usize) -> usize {
    if history.len() <= keep_recent {
        return 0;
    }
    let mut split = history.len() - keep_recent;
    while split > 0 && history[split].role == Role::Tool {
        split -= 1;
    }
    split
}

/// Whether a message is a summary produced by an earlier compaction.
pub fn is_summary(message: &Message) -> bool {
    message.role == Role::System && message.content.starts_with(SUMMARY_HEADER)
}

/// Build the summary message for a given summary body.
pub fn summary_message(body: &str) -> Message {
    Message::system(format!("{SUMMARY_HEADER}{body}"))
}

/// Render a range of history as a transcript for the summariser.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System if is_summary(m) => "earlier summary",
            Role::System => "system",
            Role::Tool => "tool",
        };
        let content = m.content.strip_prefix(SUMMARY_HEADER).unwrap_or(&m.content);
        out.push_str(&format!("[{role}] {}\n", excerpt(content, EXCERPT_CHARS)));
        for call in &m.tool_calls {
            out.push_str(&format!("  -> {}({})\n", call.name, excerpt(&call.arguments, 200)));
        }
    }
    out
}

/// A summary built locally when the summarisation call fails.
///
/// Keeps any earlier summary, every user request, and the assistant's
/// textual conclusions; tool chatter is reduced to a count.
pub fn extractive_summary(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    let mut tool_results = 0usize;
    for m in messages {
        match m.role {
            Role::System if is_summary(m) => {
                let body = m.content.trim_start_matches(SUMMARY_HEADER).trim();
                if !body.is_empty() {
                    lines.push(body.to_string());
                }
            }
            Role::User => lines.push(format!("- user asked: {}", excerpt(m.content.trim(), 200))),
            Role::Assistant if !m.content.trim().is_empty() => {
                lines.push(format!("- assistant: {}", excerpt(m.content.trim(), 200)))
            }
            Role::Tool => tool_results += 1,
            _ => {}
        }
    }
    if tool_results > 0 {
        lines.push(format!("- {tool_results} tool results omitted"));
    }
    lines.join("\n")
}

/// Maximum body length (bytes) for a summary replacing `range`.
///
/// The summary message must cost fewer tokens than the range it replaces
/// and no more than `summary_max_tokens`. Returns `None` when even an empty
/// summary would not shrink the range.
pub fn summary_budget(range: &[Message], summary_max_tokens: usize) -> Option<usize> {
    let range_tokens = estimate_messages_tokens(range);
    // tokens(summary message) = overhead + ceil((header + body) / 4) <= range_tokens - 1
    let max_tokens = range_tokens
        .checked_sub(MESSAGE_OVERHEAD + 1)?
        .min(summary_max_tokens);
    let max_bytes = (max_tokens * 4).checked_sub(SUMMARY_HEADER.len())?;
    if max_bytes == 0 || estimate_tokens(SUMMARY_HEADER) > max_tokens {
        return None;
    }
    Some(max_bytes)
}

/// Truncate `text` to at most `max_bytes`, on a char boundary.
pub fn truncate_to(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn excerpt(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    format!("{}...", truncate_to(text, max_bytes))
}
