//! File-based state store — one JSON document per agent.
//!
//! Storage layout: `<root>/<agent name>/compact.json`, by default under
//! `~/.tinyreact/agents/`. The file is human-inspectable and survives
//! restarts; a new process with the same agent name picks up the summary.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write never leaves a half-written state file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tinyreact_core::error::StoreError;
use tinyreact_core::memory::{CompactionState, StateStore};
use tracing::debug;

const STATE_FILE: &str = "compact.json";

/// A file-backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at the given directory (created on first write).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root: `~/.tinyreact/agents`
    pub fn default_root() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".tinyreact").join("agents")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the state file for `agent`.
    pub fn state_path(&self, agent: &str) -> PathBuf {
        self.root.join(sanitize(agent)).join(STATE_FILE)
    }
}

/// Agent names become directory names: one path segment, distinct names
/// never share a directory.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte is
/// written as `%XX`. The empty name maps to a bare `%`.
fn sanitize(agent: &str) -> String {
    if agent.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(agent.len());
    for byte in agent.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[async_trait]
impl StateStore for FileStateStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, agent: &str) -> Result<Option<CompactionState>, StoreError> {
        let path = self.state_path(agent);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let state = serde_json::from_str::<CompactionState>(&content).map_err(|e| {
            StoreError::Corrupted {
                agent: agent.to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!(agent, path = %path.display(), compactions = state.compactions, "Loaded compaction state");
        Ok(Some(state))
    }

    async fn save(&self, agent: &str, state: &CompactionState) -> Result<(), StoreError> {
        let path = self.state_path(agent);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create state directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize state: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace state file: {e}")))?;

        debug!(agent, path = %path.display(), "Saved compaction state");
        Ok(())
    }

    async fn clear(&self, agent: &str) -> Result<bool, StoreError> {
        let path = self.state_path(agent);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Storage(format!("Failed to remove state file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_reload_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());

        let mut state = CompactionState::default();
        state.record("user wants a CSV parser".into(), 61_000);
        store.save("coder", &state).await.unwrap();

        let path = tmp.path().join("coder").join("compact.json");
        assert!(path.exists());

        // A fresh store over the same root sees the same state
        let reopened = FileStateStore::new(tmp.path());
        let loaded = reopened.load("coder").await.unwrap().unwrap();
        assert_eq!(loaded.summary, "user wants a CSV parser");
        assert_eq!(loaded.compactions, 1);
        assert_eq!(loaded.last_trigger_tokens, 61_000);
    }

    #[tokio::test]
    async fn missing_state_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());
        assert!(store.load("nobody").await.unwrap().is_none());
        assert!(!store.clear("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());

        let mut first = CompactionState::default();
        first.record("first".into(), 1);
        let mut second = first.clone();
        second.record("second".into(), 2);

        store.save("a", &first).await.unwrap();
        store.save("a", &second).await.unwrap();
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.summary, "second");
        assert_eq!(loaded.compactions, 2);
    }

    #[tokio::test]
    async fn corrupted_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());
        let path = store.state_path("broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "this is not json").unwrap();

        let err = store.load("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn clear_removes_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());
        store.save("a", &CompactionState::default()).await.unwrap();
        assert!(store.clear("a").await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[test]
    fn agent_names_stay_inside_root() {
        let store = FileStateStore::new("/state");
        assert_eq!(
            store.state_path("../../etc"),
            PathBuf::from("/state/%2E%2E%2F%2E%2E%2Fetc/compact.json")
        );
        assert_eq!(
            store.state_path("team/lead"),
            PathBuf::from("/state/team%2Flead/compact.json")
        );
        assert_eq!(store.state_path(""), PathBuf::from("/state/%/compact.json"));
        assert_eq!(store.state_path("planner-2_b"), PathBuf::from("/state/planner-2_b/compact.json"));
    }

    #[test]
    fn similar_names_get_distinct_paths() {
        let store = FileStateStore::new("/state");
        let names = ["a/b", "a_b", "a%2Fb", "a.b", "a b", "ä", "%"];
        let paths: std::collections::HashSet<_> = names.iter().map(|n| store.state_path(n)).collect();
        assert_eq!(paths.len(), names.len());
    }

    #[tokio::test]
    async fn colliding_names_keep_separate_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(tmp.path());
        let mut slash = CompactionState::default();
        slash.record("slash".into(), 1);
        let mut underscore = CompactionState::default();
        underscore.record("underscore".into(), 1);
        store.save("a/b", &slash).await.unwrap();
        store.save("a_b", &underscore).await.unwrap();

        assert_eq!(store.load("a/b").await.unwrap().unwrap().summary, "slash");
        assert_eq!(store.load("a_b").await.unwrap().unwrap().summary, "underscore");
    }
}
