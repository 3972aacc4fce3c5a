//! The agent — a ReAct loop over one provider, one tool registry and one
//! conversation.
//!
//! An execution runs: lazy initialisation (persisted summary is loaded
//! once), the interceptor chain, then up to `max_rounds` model calls. Each
//! round either ends with a final answer or dispatches the requested tools,
//! appends their observations, and checks whether history needs
//! compacting. Every execution ends in exactly one [`Termination`].
//!
//! Agents are tools too: [`Agent::as_tool`] wraps an agent so another agent
//! (or itself) can call it. Nesting depth travels in the [`CallContext`];
//! crossing the configured limit aborts the whole call chain.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use thiserror::Error;
use tinyreact_core::CancellationToken;
use tinyreact_core::agent::AgentConfig;
use tinyreact_core::error::{ProviderError, ToolError};
use tinyreact_core::event::{DomainEvent, EventBus};
use tinyreact_core::knowledge::KnowledgeBase;
use tinyreact_core::memory::{CompactionState, StateStore};
use tinyreact_core::message::Message;
use tinyreact_core::provider::{Provider, ProviderRequest};
use tinyreact_core::tool::{CallContext, ParamSpec, ParamType, Tool, ToolRegistry, ToolResult};
use tinyreact_memory::NoopStateStore;
use tinyreact_providers::{RetryPolicy, RetryProvider};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::interceptor::{InterceptContext, Interceptor, InterceptorChain};
use crate::memory::{CompactionOutcome, MemoryManager, Session};

/// Errors that abort an execution.
#[derive(Debug, Clone, Error)]
pub enum FatalError {
    #[error("recursion limit exceeded: depth {depth} > max {max_depth}")]
    RecursionLimit { depth: u32, max_depth: u32 },

    #[error("provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// How an execution ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// The model produced a final answer
    Success,
    /// An interceptor answered without calling the model
    Intercepted { interceptor: String },
    /// The round budget ran out
    MaxRoundsExceeded,
    /// The cancellation token fired or the deadline passed
    Cancelled,
    Fatal(FatalError),
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Success => "success",
            Termination::Intercepted { .. } => "intercepted",
            Termination::MaxRoundsExceeded => "max_rounds_exceeded",
            Termination::Cancelled => "cancelled",
            Termination::Fatal(_) => "fatal",
        }
    }

    /// Whether the execution produced a usable answer.
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Success | Termination::Intercepted { .. })
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Intercepted { interceptor } => write!(f, "intercepted by {interceptor}"),
            Termination::Fatal(e) => write!(f, "fatal: {e}"),
            other => f.write_str(other.label()),
        }
    }
}

/// The result of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub agent: String,
    pub termination: Termination,
    /// The final answer, the best partial answer, or a notice
    pub answer: String,
    /// Model calls made
    pub rounds: u32,
    /// Tool calls dispatched
    pub tool_calls: usize,
    /// The most recent tool or provider error, if any
    pub last_error: Option<String>,
}

impl ExecutionReport {
    fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            termination: Termination::Success,
            answer: String::new(),
            rounds: 0,
            tool_calls: 0,
            last_error: None,
        }
    }

    fn finish(mut self, termination: Termination, answer: impl Into<String>) -> Self {
        self.termination = termination;
        self.answer = answer.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }
}

/// Per-execution controls.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Cancelling this token stops the execution at the next await point
    pub cancel: Option<CancellationToken>,
    /// Wall-clock deadline for the whole execution, nested calls included
    pub timeout: Option<Duration>,
}

/// A ReAct agent.
pub struct Agent {
    config: AgentConfig,
    provider: Arc<dyn Provider>,
    tools: RwLock<ToolRegistry>,
    knowledge: RwLock<KnowledgeBase>,
    interceptors: RwLock<InterceptorChain>,
    session: Mutex<Session>,
    memory: MemoryManager,
    dispatcher: Dispatcher,
    events: EventBus,
}

impl Agent {
    pub fn builder(config: AgentConfig, provider: Arc<dyn Provider>) -> AgentBuilder {
        AgentBuilder::new(config, provider)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    // --- Tools ---

    /// Register a tool (last writer wins). Returns whether a binding was replaced.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> bool {
        write(&self.tools).register(tool)
    }

    /// Copy the named tools from another agent's registry.
    pub fn inherit_tools(&self, from: &Agent, names: &[&str]) -> usize {
        let source = from.tools_snapshot();
        write(&self.tools).inherit_from(&source, names)
    }

    pub fn tool_names(&self) -> Vec<String> {
        read(&self.tools).names()
    }

    fn tools_snapshot(&self) -> ToolRegistry {
        read(&self.tools).clone()
    }

    /// Wrap this agent as a tool another agent (or itself) can call.
    pub fn as_tool(self: &Arc<Self>) -> Arc<dyn Tool> {
        Arc::new(AgentTool {
            agent: Arc::downgrade(self),
            name: self.config.name.clone(),
            description: self.config.description.clone(),
        })
    }

    // --- Interceptors ---

    pub fn add_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        write(&self.interceptors).add(interceptor);
    }

    pub fn interceptor_names(&self) -> Vec<String> {
        read(&self.interceptors).names()
    }

    // --- Knowledge ---

    /// Load knowledge files, appending to the system prompt.
    pub fn load_knowledge<P: AsRef<Path>>(&self, paths: &[P], base_dir: Option<&Path>) -> usize {
        write(&self.knowledge).load_files(paths, base_dir)
    }

    pub fn add_knowledge(&self, text: impl Into<String>) {
        write(&self.knowledge).add_knowledge(text);
    }

    /// The effective system prompt: base instructions plus loaded knowledge.
    pub fn system_prompt(&self) -> String {
        read(&self.knowledge).system_prompt()
    }

    // --- Session ---

    pub async fn history(&self) -> Vec<Message> {
        self.session.lock().await.history.clone()
    }

    pub async fn compaction_state(&self) -> CompactionState {
        let mut session = self.session.lock().await;
        self.memory.initialize(&mut session).await;
        session.state.clone()
    }

    /// Compact history now, regardless of the threshold.
    pub async fn compact(&self) -> Option<CompactionOutcome> {
        let system_prompt = self.system_prompt();
        let mut session = self.session.lock().await;
        self.memory.initialize(&mut session).await;
        self.memory.compact(&system_prompt, &mut session, &CancellationToken::new()).await
    }

    pub async fn clear_history(&self) {
        self.session.lock().await.history.clear();
    }

    // --- Execution ---

    /// Run a task to completion.
    pub async fn execute(&self, task: &str) -> ExecutionReport {
        self.execute_with(task, ExecuteOptions::default()).await
    }

    /// Run a task with a cancellation token and/or a deadline.
    pub async fn execute_with(&self, task: &str, options: ExecuteOptions) -> ExecutionReport {
        let cancel = options
            .cancel
            .map(|c| c.child_token())
            .unwrap_or_default();
        let ctx = CallContext::root(self.config.max_depth).with_cancel(cancel.clone());

        let run = self.run(task, &ctx);
        let Some(limit) = options.timeout else {
            return run.await;
        };

        tokio::pin!(run);
        tokio::select! {
            report = &mut run => report,
            _ = tokio::time::sleep(limit) => {
                warn!(agent = %self.config.name, timeout_secs = limit.as_secs(), "Execution deadline reached, cancelling");
                cancel.cancel();
                run.await
            }
        }
    }

    /// One execution at the depth carried by `ctx`.
    ///
    /// Uses the agent's own session when it is free. A nested call that
    /// finds it busy (the agent is already running further up the same call
    /// chain) gets a scratch session instead of waiting on itself.
    async fn run(&self, task: &str, ctx: &CallContext) -> ExecutionReport {
        let report = match self.session.try_lock() {
            Ok(mut session) => self.run_in(task, ctx, &mut session).await,
            Err(_) if ctx.depth > 0 => {
                debug!(agent = %self.config.name, depth = ctx.depth, "Session busy, using a scratch session");
                let mut scratch = Session::scratch();
                self.run_in(task, ctx, &mut scratch).await
            }
            Err(_) => {
                let mut session = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        debug!(agent = %self.config.name, "Cancelled while waiting for the session");
                        return self.finished(
                            ExecutionReport::new(&self.config.name)
                                .finish(Termination::Cancelled, "Cancelled before start."),
                            ctx,
                        );
                    }
                    session = self.session.lock() => session,
                };
                self.run_in(task, ctx, &mut session).await
            }
        };
        self.finished(report, ctx)
    }

    /// Log and publish the end of one execution.
    fn finished(&self, report: ExecutionReport, ctx: &CallContext) -> ExecutionReport {
        info!(
            agent = %report.agent,
            termination = %report.termination,
            rounds = report.rounds,
            tool_calls = report.tool_calls,
            depth = ctx.depth,
            "Execution finished"
        );
        self.events.publish(DomainEvent::Terminated {
            agent: report.agent.clone(),
            termination: report.termination.label().to_string(),
            rounds: report.rounds,
            timestamp: chrono::Utc::now(),
        });
        report
    }

    async fn run_in(&self, task: &str, ctx: &CallContext, session: &mut Session) -> ExecutionReport {
        let mut report = ExecutionReport::new(&self.config.name);
        if ctx.cancel.is_cancelled() {
            return report.finish(Termination::Cancelled, "Cancelled before start.");
        }

        self.memory.initialize(session).await;
        let system_prompt = self.system_prompt();
        let tools = self.tools_snapshot();

        let chain = read(&self.interceptors).clone();
        if !chain.is_empty() {
            let mut ictx = InterceptContext {
                agent: &self.config.name,
                system_prompt: &system_prompt,
                tools: &tools,
                dispatcher: &self.dispatcher,
                memory: &self.memory,
                call: ctx,
                session: &mut *session,
            };
            match chain.intercept(task, &mut ictx).await {
                Ok(Some(hit)) => {
                    self.events.publish(DomainEvent::Intercepted {
                        agent: self.config.name.clone(),
                        interceptor: hit.interceptor.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                    return report.finish(
                        Termination::Intercepted {
                            interceptor: hit.interceptor,
                        },
                        hit.answer,
                    );
                }
                Ok(None) => {}
                Err(fatal) => {
                    warn!(agent = %self.config.name, error = %fatal, "Interceptor hit a fatal error");
                    report.last_error = Some(fatal.to_string());
                    return report.finish(Termination::Fatal(fatal), String::new());
                }
            }
        }

        session.history.push(Message::user(task));
        self.react_loop(report, &system_prompt, &tools, ctx, session).await
    }

    async fn react_loop(
        &self,
        mut report: ExecutionReport,
        system_prompt: &str,
        tools: &ToolRegistry,
        ctx: &CallContext,
        session: &mut Session,
    ) -> ExecutionReport {
        let definitions = tools.definitions();
        let mut partial: Option<String> = None;

        while report.rounds < self.config.max_rounds {
            if ctx.cancel.is_cancelled() {
                return report.finish(Termination::Cancelled, partial.unwrap_or_default());
            }
            report.rounds += 1;
            debug!(agent = %self.config.name, round = report.rounds, depth = ctx.depth, "Calling model");
            self.events.publish(DomainEvent::RoundStarted {
                agent: self.config.name.clone(),
                round: report.rounds,
                depth: ctx.depth,
                timestamp: chrono::Utc::now(),
            });

            let request = ProviderRequest {
                model: self.config.model.clone(),
                messages: request_messages(system_prompt, &session.history),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                tools: definitions.clone(),
            };

            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    return report.finish(Termination::Cancelled, partial.unwrap_or_default());
                }
                result = self.provider.complete(request) => result,
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    error!(agent = %self.config.name, round = report.rounds, error = %e, "Provider call failed");
                    report.last_error = Some(e.to_string());
                    return report.finish(
                        Termination::Fatal(FatalError::Provider(e)),
                        partial.unwrap_or_default(),
                    );
                }
            };

            let message = response.message;
            self.events.publish(DomainEvent::ResponseGenerated {
                agent: self.config.name.clone(),
                model: response.model,
                tool_calls: message.tool_calls.len(),
                tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
                timestamp: chrono::Utc::now(),
            });

            if !message.content.trim().is_empty() {
                partial = Some(message.content.clone());
            }

            if message.tool_calls.is_empty() {
                let answer = message.content.clone();
                session.history.push(message);
                return report.finish(Termination::Success, answer);
            }

            let calls = message.tool_calls.clone();
            session.history.push(message);
            debug!(agent = %self.config.name, count = calls.len(), "Dispatching tool calls");

            let observations = self.dispatcher.dispatch_all(tools, &calls, ctx).await;
            report.tool_calls += observations.len();

            let mut fatal = None;
            for obs in &observations {
                session.history.push(obs.to_message());
                if !obs.success {
                    report.last_error = Some(obs.content.clone());
                }
                if fatal.is_none() {
                    fatal = obs.fatal();
                }
            }

            if let Some(fatal) = fatal {
                warn!(agent = %self.config.name, error = %fatal, "Aborting execution");
                return report.finish(Termination::Fatal(fatal), partial.unwrap_or_default());
            }
            if ctx.cancel.is_cancelled() {
                return report.finish(Termination::Cancelled, partial.unwrap_or_default());
            }

            self.memory.maybe_compact(system_prompt, session, &ctx.cancel).await;
        }

        warn!(agent = %self.config.name, max_rounds = self.config.max_rounds, "Round budget exhausted");
        let answer = partial.unwrap_or_else(|| {
            format!(
                "Stopped after {} rounds without a final answer.",
                self.config.max_rounds
            )
        });
        report.finish(Termination::MaxRoundsExceeded, answer)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("provider", &self.provider.name())
            .field("tools", &self.tool_names())
            .finish()
    }
}

fn request_messages(system_prompt: &str, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Builds an [`Agent`]. The provider is wrapped in a [`RetryProvider`]
/// with the configured policy and a per-attempt LLM timeout.
pub struct AgentBuilder {
    config: AgentConfig,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    knowledge: KnowledgeBase,
    interceptors: InterceptorChain,
    store: Arc<dyn StateStore>,
    retry: RetryPolicy,
    events: EventBus,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            tools: ToolRegistry::new(),
            knowledge: KnowledgeBase::default(),
            interceptors: InterceptorChain::new(),
            store: Arc::new(NoopStateStore),
            retry: RetryPolicy::default(),
            events: EventBus::default(),
        }
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.add(interceptor);
        self
    }

    /// Add the built-in system, JSON reflex and slash command interceptors.
    pub fn default_interceptors(mut self) -> Self {
        self.interceptors = InterceptorChain::with_defaults();
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Arc<Agent> {
        let provider: Arc<dyn Provider> = Arc::new(
            RetryProvider::new(self.provider, self.retry)
                .with_attempt_timeout(Duration::from_secs(self.config.llm_timeout_secs)),
        );
        let memory = MemoryManager::new(
            &self.config.name,
            Arc::clone(&provider),
            &self.config.model,
            self.config.compaction.clone(),
            self.store,
            self.events.clone(),
        );
        let dispatcher = Dispatcher::from_config(&self.config, self.events.clone());

        info!(
            agent = %self.config.name,
            model = %self.config.model,
            tools = self.tools.len(),
            max_rounds = self.config.max_rounds,
            max_depth = self.config.max_depth,
            "Agent created"
        );

        Arc::new(Agent {
            config: self.config,
            provider,
            tools: RwLock::new(self.tools),
            knowledge: RwLock::new(self.knowledge),
            interceptors: RwLock::new(self.interceptors),
            session: Mutex::new(Session::new()),
            memory,
            dispatcher,
            events: self.events,
        })
    }
}

/// An agent exposed through the [`Tool`] contract.
///
/// Holds a weak reference so agents that register each other (or
/// themselves) don't keep each other alive.
pub struct AgentTool {
    agent: Weak<Agent>,
    name: String,
    description: String,
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "task",
            ParamType::String,
            "The task for this agent, stated in full",
        )]
    }

    fn is_agent(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value, ctx: &CallContext) -> Result<ToolResult, ToolError> {
        let task = arguments["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'task'".into()))?;
        let agent = self
            .agent
            .upgrade()
            .ok_or_else(|| ToolError::failed(&self.name, "agent is no longer available"))?;

        let report = agent.run(task, ctx).await;
        match report.termination {
            Termination::Success | Termination::Intercepted { .. } => Ok(ToolResult::ok(report.answer)),
            Termination::MaxRoundsExceeded => Ok(ToolResult {
                success: false,
                output: format!(
                    "[{} stopped after {} rounds] {}",
                    self.name, report.rounds, report.answer
                ),
            }),
            Termination::Cancelled => Err(ToolError::failed(&self.name, "cancelled")),
            Termination::Fatal(FatalError::RecursionLimit { depth, max_depth }) => {
                Err(ToolError::RecursionLimitExceeded { depth, max_depth })
            }
            Termination::Fatal(FatalError::Provider(e)) => Err(ToolError::failed(&self.name, e.to_string())),
        }
    }
}
