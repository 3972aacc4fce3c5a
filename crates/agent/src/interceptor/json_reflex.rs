//! JSON reflexes: structured input answered without the model.
//!
//! Recognised shapes (checked in this order):
//!
//! - `{"action": "<name>", ...}`: answered from the action rule table
//! - `{"calc": "<expression>"}`: evaluated by the registered `calculator` tool
//! - `{"tool": "<name>", "params": {...}}`: dispatched straight to the tool
//!
//! Anything that is not a JSON object, or matches none of the shapes, passes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::{InterceptContext, InterceptResult, Interceptor};

const CALCULATOR: &str = "calculator";

pub struct JsonReflexInterceptor {
    rules: HashMap<String, String>,
}

impl JsonReflexInterceptor {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Answer `{"action": action}` with `response`.
    pub fn with_rule(mut self, action: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.insert(action.into(), response.into());
        self
    }

    pub fn rules(&self) -> &HashMap<String, String> {
        &self.rules
    }
}

impl Default for JsonReflexInterceptor {
    fn default() -> Self {
        Self::new().with_rule("ping", "pong")
    }
}

#[async_trait]
impl Interceptor for JsonReflexInterceptor {
    fn name(&self) -> &str {
        "json_reflex"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn intercept(&self, input: &str, ctx: &mut InterceptContext<'_>) -> InterceptResult {
        let trimmed = input.trim();
        if !trimmed.starts_with('{') {
            return Ok(None);
        }
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) else {
            return Ok(None);
        };

        if let Some(action) = obj.get("action").and_then(Value::as_str) {
            if let Some(response) = self.rules.get(action) {
                return Ok(Some(response.clone()));
            }
        }

        if let Some(expr) = obj.get("calc").and_then(Value::as_str) {
            if ctx.tools.get(CALCULATOR).is_none() {
                return Ok(None);
            }
            let obs = ctx
                .dispatcher
                .dispatch_value(
                    ctx.tools,
                    "reflex",
                    CALCULATOR,
                    serde_json::json!({ "expression": expr }),
                    ctx.call,
                )
                .await;
            let success = obs.success;
            let content = obs.into_answer()?;
            return Ok(Some(if success {
                format!("{expr} = {content}")
            } else {
                content
            }));
        }

        if let (Some(tool), Some(params)) = (obj.get("tool").and_then(Value::as_str), obj.get("params")) {
            let obs = ctx
                .dispatcher
                .dispatch_value(ctx.tools, "reflex", tool, params.clone(), ctx.call)
                .await;
            return obs.into_answer().map(Some);
        }

        Ok(None)
    }
}
