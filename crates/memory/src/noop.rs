//! No-op state store — disables persistence entirely.

use async_trait::async_trait;
use tinyreact_core::error::StoreError;
use tinyreact_core::memory::{CompactionState, StateStore};

/// A store that remembers nothing; every agent starts fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateStore;

#[async_trait]
impl StateStore for NoopStateStore {
    fn name(&self) -> &str { "none" }

    async fn load(&self, _agent: &str) -> Result<Option<CompactionState>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _agent: &str, _state: &CompactionState) -> Result<(), StoreError> {
        Ok(())
    }

    async fn clear(&self, _agent: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}
