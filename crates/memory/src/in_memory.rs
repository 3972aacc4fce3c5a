//! In-memory state store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tinyreact_core::error::StoreError;
use tinyreact_core::memory::{CompactionState, StateStore};
use tokio::sync::RwLock;

/// Keeps compaction state in a map for the lifetime of the process.
///
/// Clones share the same map, so two agents built over clones of one store
/// see each other's writes just like they would with files.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, CompactionState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, agent: &str) -> Result<Option<CompactionState>, StoreError> {
        Ok(self.states.read().await.get(agent).cloned())
    }

    async fn save(&self, agent: &str, state: &CompactionState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(agent.to_string(), state.clone());
        Ok(())
    }

    async fn clear(&self, agent: &str) -> Result<bool, StoreError> {
        Ok(self.states.write().await.remove(agent).is_some())
    }
}
