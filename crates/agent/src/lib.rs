//! # tinyreact Agent
//!
//! The ReAct execution core: an [`Agent`] alternates model calls with tool
//! dispatch until the model answers, the round budget runs out, the call is
//! cancelled, or a fatal error (recursion limit, provider failure) occurs.
//!
//! - [`dispatcher`]: argument parsing, validation and bounded-parallel tool execution
//! - [`interceptor`]: deterministic handlers consulted before the model
//! - [`memory`]: token estimation and history compaction
//! - [`agent`]: the loop itself, plus agents exposed as tools

pub mod agent;
pub mod dispatcher;
pub mod interceptor;
pub mod memory;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{
    Agent, AgentBuilder, AgentTool, ExecuteOptions, ExecutionReport, FatalError, Termination,
};
pub use dispatcher::{Dispatcher, Observation};
pub use interceptor::{
    InterceptContext, InterceptResult, Interception, Interceptor, InterceptorChain,
    JsonReflexInterceptor, SlashCommandInterceptor, SystemInterceptor,
};
pub use memory::{CompactionOutcome, MemoryManager, Session};
