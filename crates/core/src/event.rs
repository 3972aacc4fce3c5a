//! Domain event system — decoupled observation of agent execution.
//!
//! The execution loop publishes events as it runs. Anything interested
//! (the CLI's verbose mode, tests, a future metrics layer) subscribes
//! without the loop knowing about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The loop is about to call the model
    RoundStarted {
        agent: String,
        round: u32,
        depth: u32,
        timestamp: DateTime<Utc>,
    },

    /// The model answered
    ResponseGenerated {
        agent: String,
        model: String,
        tool_calls: usize,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An interceptor answered instead of the model
    Intercepted {
        agent: String,
        interceptor: String,
        timestamp: DateTime<Utc>,
    },

    /// History was compacted into a summary
    Compacted {
        agent: String,
        tokens_before: usize,
        tokens_after: usize,
        compactions: u64,
        timestamp: DateTime<Utc>,
    },

    /// An execution finished
    Terminated {
        agent: String,
        termination: String,
        rounds: u32,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Name of the agent the event belongs to.
    pub fn agent(&self) -> &str {
        match self {
            Self::RoundStarted { agent, .. }
            | Self::ResponseGenerated { agent, .. }
            | Self::ToolExecuted { agent, .. }
            | Self::Intercepted { agent, .. }
            | Self::Compacted { agent, .. }
            | Self::Terminated { agent, .. } => agent,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and lose old events; publishers never block.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
