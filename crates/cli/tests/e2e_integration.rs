//! End-to-end integration tests for the tinyreact runtime.
//!
//! These tests wire the real crates together (config, tools, state store,
//! interceptors, agent loop) with a scripted provider in place of the LLM.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tinyreact_agent::{Agent, Termination};
use tinyreact_config::AppConfig;
use tinyreact_core::agent::{AgentConfig, CompactionSettings};
use tinyreact_core::error::{ProviderError, ToolError};
use tinyreact_core::knowledge::KnowledgeBase;
use tinyreact_core::memory::StateStore;
use tinyreact_core::message::{Message, MessageToolCall, Role};
use tinyreact_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tinyreact_core::tool::{FnTool, ParamSpec, ParamType, ToolRegistry};
use tinyreact_memory::FileStateStore;
use tinyreact_tools::default_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays scripted responses; requests offering no tools get `summary`.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    summary: String,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            summary: "The user talked about Rust release notes.".into(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn first_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap()[0].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let summarising = request.tools.is_empty();
        self.requests.lock().unwrap().push(request);
        if summarising {
            return Ok(text_response(&self.summary));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "mock-model".into(),
    }
}

fn tool_response(calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, calls),
        usage: None,
        model: "mock-model".into(),
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(id, name, args.to_string())
}

fn add_tool() -> Arc<FnTool> {
    Arc::new(FnTool::new(
        "add",
        "Adds two integers",
        vec![
            ParamSpec::required("a", ParamType::Integer, "first operand"),
            ParamSpec::required("b", ParamType::Integer, "second operand"),
        ],
        |args| {
            let a = args["a"].as_i64().ok_or_else(|| ToolError::InvalidArguments("a".into()))?;
            let b = args["b"].as_i64().ok_or_else(|| ToolError::InvalidArguments("b".into()))?;
            Ok((a + b).to_string())
        },
    ))
}

fn agent_config(name: &str) -> AgentConfig {
    AgentConfig {
        max_rounds: 6,
        max_depth: 3,
        ..AgentConfig::new(name)
    }
}

// ── ReAct loop ───────────────────────────────────────────────────────────

#[tokio::test]
async fn add_tool_round_trip() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![call("c1", "add", json!({"a": 2, "b": 3}))], "I should add."),
        text_response("2 + 3 = 5"),
    ]);
    let agent = Agent::builder(agent_config("adder"), provider.clone())
        .tool(add_tool())
        .build();

    let report = agent.execute("What is 2 + 3?").await;

    assert!(matches!(report.termination, Termination::Success));
    assert_eq!(report.answer, "2 + 3 = 5");
    assert_eq!(report.rounds, 2);
    assert_eq!(report.tool_calls, 1);
    assert_eq!(provider.calls(), 2);

    let history = agent.history().await;
    let observation = history
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool observation in history");
    assert_eq!(observation.content, "5");
    assert_eq!(observation.tool_call_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn missing_argument_is_reported_to_the_model() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![call("c1", "add", json!({"a": 1}))], ""),
        text_response("I need both numbers."),
    ]);
    let agent = Agent::builder(agent_config("adder"), provider.clone())
        .tool(add_tool())
        .build();

    let report = agent.execute("add one").await;

    assert!(report.is_success());
    let history = agent.history().await;
    let observation = history.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(observation.content.contains("InvalidArguments"), "{}", observation.content);
    assert!(observation.content.contains("'b'"), "{}", observation.content);
    assert!(report.last_error.is_some());
}

#[tokio::test]
async fn builtin_file_tools_work_inside_the_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        tool_response(
            vec![call("w", "write_file", json!({"path": "notes/todo.md", "content": "ship it"}))],
            "",
        ),
        tool_response(vec![call("r", "read_file", json!({"path": "notes/todo.md"}))], ""),
        text_response("The note says: ship it"),
    ]);
    let agent = Agent::builder(agent_config("writer"), provider)
        .tools(default_registry(dir.path()))
        .build();

    let report = agent.execute("write a note and read it back").await;

    assert!(report.is_success());
    assert_eq!(report.tool_calls, 2);
    let written = std::fs::read_to_string(dir.path().join("notes/todo.md")).unwrap();
    assert_eq!(written, "ship it");
    let history = agent.history().await;
    assert!(history.iter().any(|m| m.role == Role::Tool && m.content.contains("ship it")));
}

#[tokio::test]
async fn nested_agent_answers_through_the_parent() {
    let child_provider = ScriptedProvider::new(vec![
        tool_response(vec![call("c", "add", json!({"a": 40, "b": 2}))], ""),
        text_response("42"),
    ]);
    let child = Agent::builder(
        AgentConfig {
            description: "Does arithmetic".into(),
            ..agent_config("mathematician")
        },
        child_provider.clone(),
    )
    .tool(add_tool())
    .build();

    let parent_provider = ScriptedProvider::new(vec![
        tool_response(vec![call("p", "mathematician", json!({"task": "40 + 2"}))], ""),
        text_response("The mathematician says 42."),
    ]);
    let parent = Agent::builder(agent_config("lead"), parent_provider).build();
    parent.register_tool(child.as_tool());

    let report = parent.execute("ask the mathematician").await;

    assert!(report.is_success());
    assert_eq!(child_provider.calls(), 2);
    let history = parent.history().await;
    assert!(history.iter().any(|m| m.role == Role::Tool && m.content == "42"));
}

// ── Interceptors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn json_calc_never_reaches_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![]);
    let agent = Agent::builder(agent_config("calc"), provider.clone())
        .tools(default_registry(dir.path()))
        .default_interceptors()
        .build();

    let report = agent.execute(r#"{"calc": "(2 + 3) * 4"}"#).await;

    assert!(matches!(report.termination, Termination::Intercepted { ref interceptor } if interceptor == "json_reflex"));
    assert_eq!(report.answer, "(2 + 3) * 4 = 20");
    assert_eq!(provider.calls(), 0);

    let slash = agent.execute("/calculator 6*7").await;
    assert_eq!(slash.answer, "42");
    assert_eq!(provider.calls(), 0);
}

// ── Knowledge ────────────────────────────────────────────────────────────

#[tokio::test]
async fn knowledge_files_shape_the_system_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("style.md"), "Always answer in haiku.").unwrap();
    std::fs::write(dir.path().join("domain.md"), "Prices are in euros.").unwrap();

    let mut knowledge = KnowledgeBase::default();
    let loaded = knowledge.load_files(&["style.md", "missing.md", "domain.md"], Some(dir.path()));
    assert_eq!(loaded, 2);

    let provider = ScriptedProvider::new(vec![text_response("ok")]);
    let agent = Agent::builder(agent_config("poet"), provider.clone())
        .knowledge(knowledge)
        .build();
    agent.add_knowledge("Today is a holiday.");

    agent.execute("hello").await;

    let request = provider.first_request();
    let system = &request.messages[0];
    assert_eq!(system.role, Role::System);
    let style = system.content.find("haiku").unwrap();
    let domain = system.content.find("euros").unwrap();
    let dynamic = system.content.find("holiday").unwrap();
    assert!(style < domain && domain < dynamic);
    assert_eq!(request.messages.last().unwrap().content, "hello");
}

// ── Persistence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn compaction_summary_survives_a_new_agent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStateStore::new(dir.path()));
    let settings = CompactionSettings {
        threshold_tokens: 50_000,
        keep_recent: 2,
        summary_max_tokens: 500,
    };
    let config = AgentConfig {
        compaction: settings,
        ..agent_config("historian")
    };

    let filler = "Rust release notes mention many improvements. ".repeat(20);
    let provider = ScriptedProvider::new(vec![
        text_response(&filler),
        text_response(&filler),
        text_response(&filler),
    ]);
    let first = Agent::builder(config.clone(), provider)
        .store(store.clone())
        .default_interceptors()
        .build();
    for i in 0..3 {
        first.execute(&format!("question {i}: {filler}")).await;
    }

    let outcome = first.compact().await.expect("history is long enough to compact");
    assert_eq!(outcome.messages_compacted, 4);
    assert!(outcome.tokens_after < outcome.tokens_before);
    assert!(store.state_path("historian").exists());

    let stored = store.load("historian").await.unwrap().unwrap();
    assert_eq!(stored.compactions, 1);
    assert!(stored.summary.contains("Rust release notes"));

    let second = Agent::builder(config, ScriptedProvider::new(vec![]))
        .store(store.clone())
        .default_interceptors()
        .build();
    let status = second.execute("/status").await;
    assert!(status.answer.contains("Summary: present"), "{}", status.answer);
    assert!(status.answer.contains("Compactions: 1"), "{}", status.answer);

    let history = second.history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].content.contains("Rust release notes"));
}

// ── Configuration ────────────────────────────────────────────────────────

#[test]
fn config_file_drives_agent_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
model = "test-model"
temperature = 0.2

[agent]
name = "researcher"
max_rounds = 12
max_depth = 4
knowledge_files = ["notes.md"]

[compaction]
threshold_tokens = 9000
keep_recent = 6

[retry]
max_attempts = 5
"#,
    )
    .unwrap();

    let mut config = AppConfig::load_from(&path).unwrap();
    config.apply_env(|key| (key == "DEEPSEEK_API_KEY").then(|| "sk-test".to_string()));

    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.retry.max_attempts, 5);

    let agent = config.agent_config();
    assert_eq!(agent.name, "researcher");
    assert_eq!(agent.model, "test-model");
    assert_eq!(agent.max_rounds, 12);
    assert_eq!(agent.max_depth, 4);
    assert_eq!(agent.compaction.threshold_tokens, 9000);
    assert_eq!(agent.compaction.keep_recent, 6);
    assert_eq!(agent.compaction.summary_max_tokens, 2000);
    assert_eq!(config.agent.knowledge_files.len(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[agent]\nmax_depth = 0\n").unwrap();
    assert!(AppConfig::load_from(&path).is_err());

    std::fs::write(&path, "model = [unclosed").unwrap();
    assert!(AppConfig::load_from(&path).is_err());

    let missing = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(missing.agent.max_rounds, 100);
}

#[test]
fn registry_names_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry: ToolRegistry = default_registry(dir.path());
    let before = registry.len();
    assert!(!registry.register(add_tool()));
    assert!(registry.register(add_tool()));
    assert_eq!(registry.len(), before + 1);
}
