//! Tool dispatcher — turns a model's tool call into an observation.
//!
//! Every call goes through the same pipeline:
//!
//! 1. parse the JSON arguments (empty means `{}`; anything but an object is rejected)
//! 2. look the tool up by name
//! 3. fill declared defaults, check required parameters and primitive kinds
//! 4. for nested agents, descend one level and enforce the depth limit
//! 5. execute under the tool timeout, racing the cancellation token
//!
//! Failures never escape as errors: they become observation text of the
//! form `Error (<Kind>): <message>` so the model can read and correct them.
//! Only recursion-limit violations are marked fatal.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tinyreact_core::agent::AgentConfig;
use tinyreact_core::error::ToolError;
use tinyreact_core::event::{DomainEvent, EventBus};
use tinyreact_core::message::{Message, MessageToolCall};
use tinyreact_core::tool::{CallContext, Tool, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

use crate::agent::FatalError;

/// The outcome of one tool call, ready to be appended to history.
#[derive(Debug, Clone)]
pub struct Observation {
    pub call_id: String,
    pub tool_name: String,
    /// Text shown to the model
    pub content: String,
    pub success: bool,
    pub duration_ms: u64,
    /// The error behind a failed call, if it failed before producing output
    pub error: Option<ToolError>,
}

impl Observation {
    /// Whether this observation must abort the calling loop.
    pub fn is_fatal(&self) -> bool {
        self.error.as_ref().is_some_and(ToolError::is_fatal)
    }

    /// The loop-aborting error carried by this observation, if any.
    pub fn fatal(&self) -> Option<FatalError> {
        match &self.error {
            Some(ToolError::RecursionLimitExceeded { depth, max_depth }) => Some(FatalError::RecursionLimit {
                depth: *depth,
                max_depth: *max_depth,
            }),
            _ => None,
        }
    }

    /// The observation text, or the fatal error behind it.
    pub fn into_answer(self) -> Result<String, FatalError> {
        match self.fatal() {
            Some(fatal) => Err(fatal),
            None => Ok(self.content),
        }
    }

    /// The tool-result message answering the originating call.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.content)
    }
}

/// Render a tool error the way the model sees it.
pub fn error_text(err: &ToolError) -> String {
    format!("Error ({}): {}", err.kind(), err)
}

/// Resolves, validates and runs tool calls for one agent.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    agent: String,
    events: EventBus,
    tool_timeout: Duration,
    max_parallel: usize,
}

impl Dispatcher {
    pub fn new(agent: impl Into<String>, events: EventBus) -> Self {
        Self {
            agent: agent.into(),
            events,
            tool_timeout: Duration::from_secs(120),
            max_parallel: 4,
        }
    }

    pub fn from_config(config: &AgentConfig, events: EventBus) -> Self {
        Self::new(&config.name, events)
            .with_timeout(Duration::from_secs(config.tool_timeout_secs))
            .with_max_parallel(config.max_parallel_tools)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Dispatch a model-issued tool call.
    pub async fn dispatch(
        &self,
        tools: &ToolRegistry,
        call: &MessageToolCall,
        ctx: &CallContext,
    ) -> Observation {
        match parse_arguments(&call.name, &call.arguments) {
            Ok(args) => self.dispatch_value(tools, &call.id, &call.name, args, ctx).await,
            Err(e) => self.observe(&call.id, &call.name, Err(e), 0),
        }
    }

    /// Dispatch a call whose arguments are already JSON.
    pub async fn dispatch_value(
        &self,
        tools: &ToolRegistry,
        call_id: &str,
        name: &str,
        args: Value,
        ctx: &CallContext,
    ) -> Observation {
        let start = Instant::now();
        let result = self.invoke(tools, name, args, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        self.observe(call_id, name, result, duration_ms)
    }

    /// Run several calls with a bounded window; observations come back in
    /// request order regardless of completion order.
    pub async fn dispatch_all(
        &self,
        tools: &ToolRegistry,
        calls: &[MessageToolCall],
        ctx: &CallContext,
    ) -> Vec<Observation> {
        let pending: Vec<_> = calls.iter().map(|call| self.dispatch(tools, call, ctx)).collect();
        stream::iter(pending)
            .buffered(self.max_parallel)
            .collect()
            .await
    }

    /// Resolve, validate and execute without building an observation.
    pub async fn invoke(
        &self,
        tools: &ToolRegistry,
        name: &str,
        args: Value,
        ctx: &CallContext,
    ) -> Result<ToolResult, ToolError> {
        let args = match args {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => args,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "arguments for '{name}' must be a JSON object, got {}",
                    json_type(&other)
                )));
            }
        };

        let tool = tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
            available: tools.names(),
        })?;

        let args = prepare_arguments(tool.as_ref(), args)?;

        let exec_ctx = if tool.is_agent() {
            let child = ctx.descend()?;
            debug!(tool = name, depth = child.depth, "Descending into nested agent");
            child
        } else {
            ctx.clone()
        };

        let execution = async {
            if tool.is_agent() {
                // Nested agents are bounded by their own rounds and LLM timeouts.
                return tool.execute(args, &exec_ctx).await;
            }
            match tokio::time::timeout(self.tool_timeout, tool.execute(args, &exec_ctx)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::failed(
                    name,
                    format!("timed out after {}s", self.tool_timeout.as_secs()),
                )),
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(ToolError::failed(name, "cancelled")),
            result = execution => result,
        }
    }

    fn observe(
        &self,
        call_id: &str,
        name: &str,
        result: Result<ToolResult, ToolError>,
        duration_ms: u64,
    ) -> Observation {
        let (content, success, error) = match result {
            Ok(r) => (r.output, r.success, None),
            Err(e) => (error_text(&e), false, Some(e)),
        };

        if success {
            info!(
                agent = %self.agent,
                tool = name,
                duration_ms,
                output_bytes = content.len(),
                "Tool executed"
            );
        } else {
            warn!(
                agent = %self.agent,
                tool = name,
                duration_ms,
                output_bytes = content.len(),
                "Tool failed"
            );
        }

        self.events.publish(DomainEvent::ToolExecuted {
            agent: self.agent.clone(),
            tool_name: name.to_string(),
            success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        Observation {
            call_id: call_id.to_string(),
            tool_name: name.to_string(),
            content,
            success,
            duration_ms,
            error,
        }
    }
}

fn parse_arguments(name: &str, raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| {
        ToolError::InvalidArguments(format!("arguments for '{name}' are not valid JSON: {e}"))
    })
}

/// Fill defaults and check the declared schema. Undeclared keys pass through.
fn prepare_arguments(tool: &dyn Tool, args: Value) -> Result<Value, ToolError> {
    let Value::Object(mut map) = args else {
        return Err(ToolError::InvalidArguments(format!(
            "arguments for '{}' must be a JSON object",
            tool.name()
        )));
    };

    for spec in tool.parameters() {
        match map.get(&spec.name) {
            Some(value) if !value.is_null() => {
                if !spec.kind.accepts(value) {
                    return Err(ToolError::InvalidArguments(format!(
                        "parameter '{}' of '{}' must be {}, got {}",
                        spec.name,
                        tool.name(),
                        spec.kind.schema_type().unwrap_or("any"),
                        json_type(value)
                    )));
                }
            }
            _ => {
                map.remove(&spec.name);
                if let Some(default) = spec.default {
                    map.insert(spec.name, default);
                } else if spec.required {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}' for '{}'",
                        spec.name,
                        tool.name()
                    )));
                }
            }
        }
    }

    Ok(Value::Object(map))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tinyreact_core::error::ToolErrorKind;
    use tinyreact_core::tool::{FnTool, ParamSpec, ParamType};

    fn echo_args_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "add",
            "Returns its arguments",
            vec![
                ParamSpec::required("a", ParamType::Integer, "first"),
                ParamSpec::required("b", ParamType::Integer, "second"),
            ],
            |args| Ok(args.to_string()),
        ))
    }

    fn registry(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
        let mut r = ToolRegistry::new();
        for t in tools {
            r.register(t);
        }
        r
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new("test", EventBus::default())
    }

    struct SleepyTool {
        name: &'static str,
        millis: u64,
    }

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Sleeps, then answers with its name"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![]
        }
        async fn execute(&self, _args: Value, _ctx: &CallContext) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            Ok(ToolResult::ok(self.name))
        }
    }

    struct CountingAgentTool {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Tool for CountingAgentTool {
        fn name(&self) -> &str {
            "child"
        }
        fn description(&self) -> &str {
            "Pretends to be a nested agent"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::required("task", ParamType::String, "task")]
        }
        fn is_agent(&self) -> bool {
            true
        }
        async fn execute(&self, _args: Value, ctx: &CallContext) -> Result<ToolResult, ToolError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::ok(format!("depth {}", ctx.depth)))
        }
    }

    #[tokio::test]
    async fn missing_required_parameter_is_named() {
        let tools = registry(vec![echo_args_tool()]);
        let call = MessageToolCall::new("c1", "add", r#"{"a":1}"#);
        let obs = dispatcher().dispatch(&tools, &call, &CallContext::root(10)).await;

        assert!(!obs.success);
        assert_eq!(obs.error.as_ref().map(|e| e.kind()), Some(ToolErrorKind::InvalidArguments));
        assert!(obs.content.starts_with("Error (InvalidArguments)"));
        assert!(obs.content.contains("'b'"), "{}", obs.content);
        assert_eq!(obs.call_id, "c1");
    }

    #[tokio::test]
    async fn valid_arguments_reach_executor_unmodified() {
        let tools = registry(vec![echo_args_tool()]);
        let call = MessageToolCall::new("c1", "add", r#"{"a":1,"b":2}"#);
        let obs = dispatcher().dispatch(&tools, &call, &CallContext::root(10)).await;

        assert!(obs.success);
        let seen: Value = serde_json::from_str(&obs.content).unwrap();
        assert_eq!(seen, json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn unknown_tool_lists_available() {
        let tools = registry(vec![echo_args_tool()]);
        let call = MessageToolCall::new("c1", "mul", "{}");
        let obs = dispatcher().dispatch(&tools, &call, &CallContext::root(10)).await;

        assert!(obs.content.starts_with("Error (NotFound)"));
        assert!(obs.content.contains("add"));
        assert!(!obs.is_fatal());
    }

    #[tokio::test]
    async fn malformed_and_non_object_arguments_rejected() {
        let tools = registry(vec![echo_args_tool()]);
        let ctx = CallContext::root(10);
        let d = dispatcher();

        let bad_json = d.dispatch(&tools, &MessageToolCall::new("c1", "add", "{a:"), &ctx).await;
        assert!(bad_json.content.starts_with("Error (InvalidArguments)"));

        let array = d.dispatch(&tools, &MessageToolCall::new("c2", "add", "[1,2]"), &ctx).await;
        assert!(array.content.contains("must be a JSON object"));
    }

    #[tokio::test]
    async fn wrong_kind_rejected_and_defaults_filled() {
        let tool: Arc<dyn Tool> = Arc::new(FnTool::new(
            "greet",
            "Greets",
            vec![
                ParamSpec::required("name", ParamType::String, "who"),
                ParamSpec::optional("times", ParamType::Integer, "repeat", Some(json!(1))),
            ],
            |args| Ok(args.to_string()),
        ));
        let tools = registry(vec![tool]);
        let ctx = CallContext::root(10);
        let d = dispatcher();

        let wrong = d.dispatch(&tools, &MessageToolCall::new("c1", "greet", r#"{"name":5}"#), &ctx).await;
        assert!(wrong.content.contains("'name'"));
        assert!(wrong.content.contains("must be string"));

        let ok = d.dispatch(&tools, &MessageToolCall::new("c2", "greet", r#"{"name":"ada"}"#), &ctx).await;
        let seen: Value = serde_json::from_str(&ok.content).unwrap();
        assert_eq!(seen, json!({"name": "ada", "times": 1}));

        let empty = d.dispatch(&tools, &MessageToolCall::new("c3", "greet", ""), &ctx).await;
        assert!(empty.content.contains("missing required parameter 'name'"));
    }

    #[tokio::test]
    async fn executor_failure_becomes_execution_failed() {
        let tool: Arc<dyn Tool> = Arc::new(FnTool::new("boom", "Fails", vec![], |_| {
            Err(ToolError::failed("boom", "kaput"))
        }));
        let tools = registry(vec![tool]);
        let obs = dispatcher()
            .dispatch(&tools, &MessageToolCall::new("c1", "boom", "{}"), &CallContext::root(10))
            .await;
        assert!(obs.content.contains("ExecutionFailed"));
        assert!(obs.content.contains("kaput"));
        assert!(!obs.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let tools = registry(vec![Arc::new(SleepyTool { name: "slow", millis: 10_000 })]);
        let d = dispatcher().with_timeout(Duration::from_secs(1));
        let obs = d
            .dispatch(&tools, &MessageToolCall::new("c1", "slow", "{}"), &CallContext::root(10))
            .await;
        assert!(obs.content.starts_with("Error (ExecutionFailed)"));
        assert!(obs.content.contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_context_stops_execution() {
        let tools = registry(vec![Arc::new(SleepyTool { name: "slow", millis: 60_000 })]);
        let ctx = CallContext::root(10);
        ctx.cancel.cancel();
        let obs = dispatcher()
            .dispatch(&tools, &MessageToolCall::new("c1", "slow", "{}"), &ctx)
            .await;
        assert!(obs.content.contains("cancelled"));
    }

    #[tokio::test]
    async fn agent_tool_past_max_depth_is_fatal_and_not_run() {
        let child = Arc::new(CountingAgentTool { runs: AtomicUsize::new(0) });
        let tools = registry(vec![child.clone()]);
        let d = dispatcher();
        let call = MessageToolCall::new("c1", "child", r#"{"task":"go"}"#);

        let ok = d.dispatch(&tools, &call, &CallContext::root(2).descend().unwrap()).await;
        assert_eq!(ok.content, "depth 2");

        let at_limit = CallContext::root(2).descend().unwrap().descend().unwrap();
        let obs = d.dispatch(&tools, &call, &at_limit).await;
        assert!(obs.is_fatal());
        assert!(obs.content.starts_with("Error (RecursionLimitExceeded)"));
        assert_eq!(child.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_all_preserves_request_order() {
        let tools = registry(vec![
            Arc::new(SleepyTool { name: "slow", millis: 300 }),
            Arc::new(SleepyTool { name: "fast", millis: 10 }),
            Arc::new(SleepyTool { name: "medium", millis: 100 }),
        ]);
        let calls = vec![
            MessageToolCall::new("1", "slow", ""),
            MessageToolCall::new("2", "fast", ""),
            MessageToolCall::new("3", "medium", ""),
        ];
        let obs = dispatcher()
            .with_max_parallel(2)
            .dispatch_all(&tools, &calls, &CallContext::root(10))
            .await;
        let ids: Vec<_> = obs.iter().map(|o| o.call_id.as_str()).collect();
        let contents: Vec<_> = obs.iter().map(|o| o.content.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(contents, vec!["slow", "fast", "medium"]);
    }

    #[tokio::test]
    async fn dispatch_all_runs_on_a_spawned_task() {
        let child: Arc<dyn Tool> = Arc::new(CountingAgentTool { runs: AtomicUsize::new(0) });
        let tools = registry(vec![child, echo_args_tool()]);
        let calls = vec![
            MessageToolCall::new("1", "child", r#"{"task":"go"}"#),
            MessageToolCall::new("2", "add", r#"{"a":1,"b":2}"#),
        ];
        let handle = tokio::spawn(async move {
            dispatcher()
                .dispatch_all(&tools, &calls, &CallContext::root(3))
                .await
        });
        let obs = handle.await.unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].content, "depth 1");
        assert!(obs[1].success);
    }

    #[tokio::test]
    async fn dispatch_publishes_tool_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let tools = registry(vec![echo_args_tool()]);
        Dispatcher::new("calc-agent", bus)
            .dispatch(&tools, &MessageToolCall::new("c1", "add", r#"{"a":1,"b":2}"#), &CallContext::root(1))
            .await;

        let event = rx.try_recv().unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { agent, tool_name, success, .. } => {
                assert_eq!(agent, "calc-agent");
                assert_eq!(tool_name, "add");
                assert!(*success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
