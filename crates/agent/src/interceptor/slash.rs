//! Slash commands that invoke registered tools directly.
//!
//! `/<tool> key=value ...` calls `<tool>` with the given arguments. Values
//! that parse as JSON keep their type (`a=2` is a number); everything else
//! is a string. Double quotes group words: `path="my notes.md"`. Bare words
//! fill the tool's declared parameters in order, so `/calculator 2*21`
//! works too. Dashes in the command name match underscores in tool names.
//!
//! Commands that don't name a registered tool pass through.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{InterceptContext, InterceptResult, Interceptor};
use crate::dispatcher::error_text;
use tinyreact_core::error::ToolError;

pub struct SlashCommandInterceptor;

#[async_trait]
impl Interceptor for SlashCommandInterceptor {
    fn name(&self) -> &str {
        "slash_command"
    }

    fn priority(&self) -> i32 {
        40
    }

    async fn intercept(&self, input: &str, ctx: &mut InterceptContext<'_>) -> InterceptResult {
        let Some(rest) = input.trim().strip_prefix('/') else {
            return Ok(None);
        };
        let (command, raw_args) = match rest.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a),
            None => (rest, ""),
        };
        if command.is_empty() {
            return Ok(None);
        }

        let Some(tool) = ctx
            .tools
            .get(command)
            .or_else(|| ctx.tools.get(&command.replace('-', "_")))
        else {
            return Ok(None);
        };
        let tool_name = tool.name().to_string();

        let declared: Vec<String> = tool.parameters().into_iter().map(|p| p.name).collect();
        let args = match parse_arguments(raw_args, &declared) {
            Ok(args) => args,
            Err(reason) => return Ok(Some(error_text(&ToolError::InvalidArguments(reason)))),
        };

        let obs = ctx
            .dispatcher
            .dispatch_value(ctx.tools, "slash", &tool_name, Value::Object(args), ctx.call)
            .await;
        obs.into_answer().map(Some)
    }
}

/// Turn `key=value` pairs and positional words into a JSON object.
fn parse_arguments(raw: &str, declared: &[String]) -> Result<Map<String, Value>, String> {
    let mut named = Map::new();
    let mut positional = Vec::new();

    for token in split_tokens(raw)? {
        match token.split_once('=') {
            Some((key, value)) if is_key(key) => {
                named.insert(key.to_string(), parse_value(value));
            }
            _ => positional.push(parse_value(&token)),
        }
    }

    let mut free = declared
        .iter()
        .filter(|name| !named.contains_key(*name))
        .cloned()
        .collect::<Vec<_>>()
        .into_iter();
    for value in positional {
        let Some(name) = free.next() else {
            return Err(format!("too many positional arguments (declared: {})", declared.join(", ")));
        };
        named.insert(name, value);
    }
    Ok(named)
}

fn is_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Whitespace-separated tokens; double quotes group and are kept.
fn split_tokens(raw: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in raw.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quote".into());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(_) => Value::String(raw.trim_matches('"').to_string()),
    }
}
