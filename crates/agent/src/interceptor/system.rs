//! Built-in system commands, checked before everything else.

use async_trait::async_trait;

use super::{InterceptContext, InterceptResult, Interceptor};
use crate::memory::compaction::is_summary;

const HELP: &str = "\
System commands:
  /status   show agent status (messages, tokens, compactions)
  /tools    list registered tools
  /compact  compact the conversation history now
  /save     persist the compaction state now
  /clear    clear the conversation history (system prompt is kept)
  /help     show this help

Tool commands:
  /<tool> key=value ...   run a registered tool directly";

pub struct SystemInterceptor;

#[async_trait]
impl Interceptor for SystemInterceptor {
    fn name(&self) -> &str {
        "system"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn intercept(&self, input: &str, ctx: &mut InterceptContext<'_>) -> InterceptResult {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return Ok(None);
        }
        let Some(command) = trimmed.split_whitespace().next() else {
            return Ok(None);
        };

        let answer = match command.to_lowercase().as_str() {
            "/help" => Some(HELP.to_string()),
            "/status" => Some(status(ctx)),
            "/tools" => Some(tools(ctx)),
            "/clear" => {
                let cleared = ctx.session.history.len();
                ctx.session.history.clear();
                Some(format!("Cleared {cleared} messages. System prompt and knowledge are unchanged."))
            }
            "/compact" => Some(compact(ctx).await),
            "/save" => Some(save(ctx).await),
            _ => None,
        };
        Ok(answer)
    }
}

fn status(ctx: &InterceptContext<'_>) -> String {
    let history = &ctx.session.history;
    let tokens = ctx.memory.estimate(ctx.system_prompt, history);
    let mut lines = vec![
        format!("Agent: {}", ctx.agent),
        format!("Messages: {}", history.len()),
        format!(
            "Tokens: ~{tokens} / {}",
            ctx.memory.settings().threshold_tokens
        ),
        format!("Compactions: {}", ctx.session.state.compactions),
        format!("Tools: {}", ctx.tools.len()),
        format!("Depth: {}/{}", ctx.call.depth, ctx.call.max_depth),
    ];
    if history.first().is_some_and(is_summary) {
        lines.push("Summary: present".into());
    }
    lines.join("\n")
}

fn tools(ctx: &InterceptContext<'_>) -> String {
    if ctx.tools.is_empty() {
        return "No tools registered.".into();
    }
    let mut out = String::from("Registered tools:");
    for def in ctx.tools.definitions() {
        out.push_str(&format!("\n  {:<18} {}", def.name, def.description));
    }
    out
}

async fn compact(ctx: &mut InterceptContext<'_>) -> String {
    let before = ctx.session.history.len();
    match ctx.memory.compact(ctx.system_prompt, ctx.session, &ctx.call.cancel).await {
        Some(outcome) => format!(
            "Compacted {} messages: {} → {} messages, ~{} → ~{} tokens.",
            outcome.messages_compacted,
            before,
            ctx.session.history.len(),
            outcome.tokens_before,
            outcome.tokens_after
        ),
        None => "Nothing to compact.".into(),
    }
}

async fn save(ctx: &mut InterceptContext<'_>) -> String {
    if ctx.session.is_scratch() {
        return "Nothing to save: this run uses a scratch session.".into();
    }
    match ctx.memory.store().save(ctx.agent, &ctx.session.state).await {
        Ok(()) => format!(
            "Saved compaction state for '{}' ({} compactions).",
            ctx.agent, ctx.session.state.compactions
        ),
        Err(e) => format!("Failed to save state: {e}"),
    }
}
