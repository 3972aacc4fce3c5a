//! # tinyreact Core
//!
//! Domain types, traits, and error definitions for the tinyreact agent core.
//! This crate has **no framework code**: it defines the domain model that
//! the provider, store, tool and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here (`Provider`, `Tool`, `StateStore`).
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers and in-memory stores.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod agent;
pub mod knowledge;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError, ToolErrorKind};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{CallContext, FnTool, ParamSpec, ParamType, Tool, ToolRegistry, ToolResult};
pub use memory::{CompactionState, StateStore};
pub use agent::{AgentConfig, CompactionSettings};
pub use knowledge::{KnowledgeBase, KnowledgeSection, KnowledgeSource};
pub use event::{DomainEvent, EventBus};

/// Re-exported so dependents share one cancellation token type.
pub use tokio_util::sync::CancellationToken;
