//! Interceptor chain — deterministic handlers that run before the model.
//!
//! Each interceptor gets a look at the raw task input. The first one to
//! return `Some(answer)` short-circuits the execution: no LLM call is made
//! and the answer is returned as-is. Interceptors run in descending
//! priority; equal priorities keep insertion order.
//!
//! Probing must be side-effect free: an interceptor only acts once it has
//! fully parsed the input and decided it is responsible for it.

mod json_reflex;
mod slash;
mod system;

pub use json_reflex::JsonReflexInterceptor;
pub use slash::SlashCommandInterceptor;
pub use system::SystemInterceptor;

use async_trait::async_trait;
use std::sync::Arc;
use tinyreact_core::tool::{CallContext, ToolRegistry};

use crate::agent::FatalError;
use crate::dispatcher::Dispatcher;
use crate::memory::{MemoryManager, Session};

/// What an interceptor can see and touch while handling input.
pub struct InterceptContext<'a> {
    pub agent: &'a str,
    /// The effective system prompt for this execution
    pub system_prompt: &'a str,
    pub tools: &'a ToolRegistry,
    pub dispatcher: &'a Dispatcher,
    pub memory: &'a MemoryManager,
    pub call: &'a CallContext,
    pub session: &'a mut Session,
}

/// `Ok(Some(answer))` handles the input, `Ok(None)` passes it on, `Err`
/// aborts the execution.
pub type InterceptResult = Result<Option<String>, FatalError>;

/// A deterministic pre-model handler.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Higher runs first.
    fn priority(&self) -> i32;

    /// Answer the input, pass it on, or fail fatally.
    async fn intercept(&self, input: &str, ctx: &mut InterceptContext<'_>) -> InterceptResult;
}

/// The answer produced by the chain, with the interceptor that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interception {
    pub interceptor: String,
    pub answer: String,
}

/// Interceptors ordered by descending priority.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in system, JSON reflex and slash command interceptors.
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.add(Arc::new(SystemInterceptor));
        chain.add(Arc::new(JsonReflexInterceptor::default()));
        chain.add(Arc::new(SlashCommandInterceptor));
        chain
    }

    /// Insert keeping descending priority; ties go after existing entries.
    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) {
        let priority = interceptor.priority();
        let pos = self
            .interceptors
            .iter()
            .position(|i| i.priority() < priority)
            .unwrap_or(self.interceptors.len());
        self.interceptors.insert(pos, interceptor);
    }

    pub fn names(&self) -> Vec<String> {
        self.interceptors.iter().map(|i| i.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain; the first `Some` wins and the first `Err` aborts.
    pub async fn intercept(
        &self,
        input: &str,
        ctx: &mut InterceptContext<'_>,
    ) -> Result<Option<Interception>, FatalError> {
        for interceptor in &self.interceptors {
            if let Some(answer) = interceptor.intercept(input, ctx).await? {
                tracing::debug!(
                    agent = ctx.agent,
                    interceptor = interceptor.name(),
                    "Input handled by interceptor"
                );
                return Ok(Some(Interception {
                    interceptor: interceptor.name().to_string(),
                    answer,
                }));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}
