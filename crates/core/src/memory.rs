//! Persisted compaction state — the only state that survives a restart.
//!
//! Each agent keeps a rolling summary of its compacted conversation history.
//! A [`StateStore`] persists that summary keyed by agent name so a new
//! process can resume where the previous one left off. Writes are
//! last-writer-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Rolling summary plus compaction bookkeeping for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionState {
    /// The current rolling summary (empty until the first compaction)
    #[serde(default)]
    pub summary: String,

    /// Estimated token count that triggered the last compaction
    #[serde(default)]
    pub last_trigger_tokens: usize,

    /// Number of compactions performed so far; never decreases
    #[serde(default)]
    pub compactions: u64,

    /// When the last compaction happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compacted_at: Option<DateTime<Utc>>,
}

impl CompactionState {
    pub fn has_summary(&self) -> bool {
        !self.summary.trim().is_empty()
    }

    /// Record a finished compaction.
    pub fn record(&mut self, summary: String, trigger_tokens: usize) {
        self.summary = summary;
        self.last_trigger_tokens = trigger_tokens;
        self.compactions += 1;
        self.last_compacted_at = Some(Utc::now());
    }
}

/// Name-addressed storage for [`CompactionState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Load the state persisted for `agent`, if any.
    async fn load(&self, agent: &str) -> Result<Option<CompactionState>, StoreError>;

    /// Persist the state for `agent`, replacing what was there.
    async fn save(&self, agent: &str, state: &CompactionState) -> Result<(), StoreError>;

    /// Remove the persisted state for `agent`. Returns whether anything was removed.
    async fn clear(&self, agent: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_increments_counter() {
        let mut state = CompactionState::default();
        assert!(!state.has_summary());
        state.record("facts".into(), 60_000);
        state.record("more facts".into(), 55_000);
        assert_eq!(state.compactions, 2);
        assert_eq!(state.summary, "more facts");
        assert_eq!(state.last_trigger_tokens, 55_000);
        assert!(state.last_compacted_at.is_some());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let state: CompactionState = serde_json::from_str(r#"{"summary":"x"}"#).unwrap();
        assert_eq!(state.summary, "x");
        assert_eq!(state.compactions, 0);
    }
}
