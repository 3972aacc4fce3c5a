//! Agent configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for one agent's behavior.
///
/// Every limit here is enforced by the execution loop; none is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name, also the key for persisted state
    pub name: String,

    /// One-line description, shown to a parent model when this agent is a tool
    #[serde(default = "default_description")]
    pub description: String,

    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temp")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum LLM calls per execution
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Maximum nesting of agent-as-tool calls
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Concurrent tool calls per round
    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: usize,

    #[serde(default = "default_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub llm_timeout_secs: u64,

    #[serde(default)]
    pub compaction: CompactionSettings,
}

/// When and how history is compacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSettings {
    /// Estimated token count above which compaction triggers
    #[serde(default = "default_threshold")]
    pub threshold_tokens: usize,

    /// Most recent messages kept verbatim
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Upper bound on the summary size
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,
}

fn default_description() -> String {
    "A general purpose ReAct agent".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_temp() -> f32 {
    0.7
}
fn default_max_rounds() -> u32 {
    100
}
fn default_max_depth() -> u32 {
    10
}
fn default_max_parallel_tools() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_threshold() -> usize {
    50_000
}
fn default_keep_recent() -> usize {
    10
}
fn default_summary_max_tokens() -> usize {
    2_000
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: default_description(),
            model: default_model(),
            temperature: default_temp(),
            max_tokens: None,
            max_rounds: default_max_rounds(),
            max_depth: default_max_depth(),
            max_parallel_tools: default_max_parallel_tools(),
            tool_timeout_secs: default_timeout_secs(),
            llm_timeout_secs: default_timeout_secs(),
            compaction: CompactionSettings::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("main")
    }
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            threshold_tokens: default_threshold(),
            keep_recent: default_keep_recent(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}
