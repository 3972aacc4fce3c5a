//! Tool trait — the uniform capability contract.
//!
//! Ordinary functions and nested agents both implement [`Tool`], which is
//! what lets agents register other agents (or themselves) as callable tools.
//! Every call carries a [`CallContext`] holding the current recursion depth;
//! the context is cloned into nested calls, never shared.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The JSON type a tool parameter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Accept any JSON value
    Any,
}

impl ParamType {
    /// The JSON Schema `type` keyword, if any.
    pub fn schema_type(&self) -> Option<&'static str> {
        match self {
            ParamType::String => Some("string"),
            ParamType::Integer => Some("integer"),
            ParamType::Number => Some("number"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Object => Some("object"),
            ParamType::Array => Some("array"),
            ParamType::Any => None,
        }
    }

    /// Whether `value` is acceptable for this type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

/// One entry of a tool's ordered parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// An optional parameter, with an optional default filled in by the dispatcher.
    pub fn optional(
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
        default: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default,
        }
    }
}

/// Render an ordered parameter list as a JSON Schema object.
pub fn parameters_to_schema(params: &[ParamSpec]) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in params {
        let mut prop = serde_json::Map::new();
        if let Some(t) = p.kind.schema_type() {
            prop.insert("type".into(), serde_json::Value::String(t.into()));
        }
        if !p.description.is_empty() {
            prop.insert("description".into(), serde_json::Value::String(p.description.clone()));
        }
        if let Some(default) = &p.default {
            prop.insert("default".into(), default.clone());
        }
        properties.insert(p.name.clone(), serde_json::Value::Object(prop));
        if p.required {
            required.push(serde_json::Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Per-call execution context, passed by value down the call chain.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Number of nested agent invocations on the stack for this call
    pub depth: u32,

    /// Maximum nesting allowed for the top-level invocation
    pub max_depth: u32,

    /// Cancellation signal shared by the whole top-level invocation
    pub cancel: CancellationToken,
}

impl CallContext {
    /// A top-level context (depth 0).
    pub fn root(max_depth: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
            cancel: CancellationToken::new(),
        }
    }

    /// Use the given cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The context for a call one agent level deeper, or the error that
    /// forbids it.
    pub fn descend(&self) -> std::result::Result<CallContext, ToolError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(ToolError::RecursionLimitExceeded {
                depth,
                max_depth: self.max_depth,
            });
        }
        Ok(CallContext {
            depth,
            max_depth: self.max_depth,
            cancel: self.cancel.clone(),
        })
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in a [`ToolRegistry`] and made available to the
/// agent loop. Arguments reach `execute` already parsed, defaulted and
/// checked against [`Tool::parameters`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file", "add").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Ordered parameter schema.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &CallContext,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Whether this tool is a nested agent (counts towards recursion depth).
    fn is_agent(&self) -> bool {
        false
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: parameters_to_schema(&self.parameters()),
        }
    }
}

type ToolFn = dyn Fn(serde_json::Value) -> std::result::Result<String, ToolError> + Send + Sync;

/// A tool backed by a plain closure.
///
/// Handy for native functions that need no async I/O.
pub struct FnTool {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        func: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> std::result::Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        self.params.clone()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &CallContext,
    ) -> std::result::Result<ToolResult, ToolError> {
        (self.func)(arguments).map(ToolResult::ok)
    }
}

/// A registry of available tools, owned by one agent.
///
/// Registration is last-writer-wins: registering a name again replaces the
/// prior binding in place, which is how agents inherit tools from each other.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Returns `true` when an existing binding was replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        let replaced = self.tools.insert(name.clone(), tool).is_some();
        if !replaced {
            self.order.push(name);
        }
        replaced
    }

    /// Copy the named bindings from another registry (missing names are skipped).
    pub fn inherit_from(&mut self, other: &ToolRegistry, names: &[&str]) -> usize {
        let mut copied = 0;
        for name in names {
            if let Some(tool) = other.tools.get(*name) {
                self.register(Arc::clone(tool));
                copied += 1;
            }
        }
        copied
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, in first-registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.to_definition())
            .collect()
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}
