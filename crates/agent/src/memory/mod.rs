//! Memory manager — keeps an agent's history inside its token budget.
//!
//! History lives in a [`Session`]. When the estimated size of system prompt
//! plus history crosses the configured threshold, everything except the
//! most recent messages is folded into a single `[Conversation Summary]`
//! system message. The rolling summary is persisted through a
//! [`StateStore`] so the next process starts from it.

pub mod compaction;
pub mod token;

use std::sync::Arc;
use tinyreact_core::agent::CompactionSettings;
use tinyreact_core::event::{DomainEvent, EventBus};
use tinyreact_core::memory::{CompactionState, StateStore};
use tinyreact_core::message::Message;
use tinyreact_core::provider::{Provider, ProviderRequest};
use tinyreact_core::CancellationToken;
use tracing::{debug, info, warn};

use compaction::{
    SUMMARY_INSTRUCTIONS, extractive_summary, render_transcript, split_point, summary_budget,
    summary_message, truncate_to,
};
use token::estimate_context_tokens;

/// One agent's conversational state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Conversation history, never including the system prompt
    pub history: Vec<Message>,
    /// Rolling summary and compaction counter
    pub state: CompactionState,
    initialized: bool,
    persist: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            state: CompactionState::default(),
            initialized: false,
            persist: true,
        }
    }

    /// A throwaway session for re-entrant nested runs. Never loads or saves
    /// persisted state.
    pub fn scratch() -> Self {
        Self {
            initialized: true,
            persist: false,
            ..Self::new()
        }
    }

    pub fn is_scratch(&self) -> bool {
        !self.persist
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// What a compaction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub messages_compacted: usize,
    /// The summary was built locally because the summarisation call failed
    pub extractive: bool,
}

/// Estimates, compacts and persists one agent's history.
pub struct MemoryManager {
    agent: String,
    provider: Arc<dyn Provider>,
    model: String,
    settings: CompactionSettings,
    store: Arc<dyn StateStore>,
    events: EventBus,
}

impl MemoryManager {
    pub fn new(
        agent: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        settings: CompactionSettings,
        store: Arc<dyn StateStore>,
        events: EventBus,
    ) -> Self {
        Self {
            agent: agent.into(),
            provider,
            model: model.into(),
            settings,
            store,
            events,
        }
    }

    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Estimated tokens of a request built from this prompt and history.
    pub fn estimate(&self, system_prompt: &str, history: &[Message]) -> usize {
        estimate_context_tokens(system_prompt, history)
    }

    pub fn needs_compaction(&self, system_prompt: &str, history: &[Message]) -> bool {
        self.estimate(system_prompt, history) > self.settings.threshold_tokens
    }

    /// Load persisted state into a fresh session, seeding history with the
    /// stored summary. Runs once per session; store failures are logged.
    pub async fn initialize(&self, session: &mut Session) {
        if session.initialized {
            return;
        }
        session.initialized = true;
        if !session.persist {
            return;
        }

        match self.store.load(&self.agent).await {
            Ok(Some(state)) => {
                if state.has_summary() && session.history.is_empty() {
                    session.history.push(summary_message(&state.summary));
                }
                debug!(
                    agent = %self.agent,
                    compactions = state.compactions,
                    "Loaded persisted compaction state"
                );
                session.state = state;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "Failed to load compaction state, starting fresh");
            }
        }
    }

    /// Compact when the history is over the threshold; otherwise a no-op.
    pub async fn maybe_compact(
        &self,
        system_prompt: &str,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Option<CompactionOutcome> {
        if !self.needs_compaction(system_prompt, &session.history) {
            return None;
        }
        self.compact(system_prompt, session, cancel).await
    }

    /// Compact regardless of the threshold. Returns `None` when the history
    /// is too short for compaction to shrink it, or when `cancel` fires
    /// before the summary is ready; the session is untouched in both cases.
    pub async fn compact(
        &self,
        system_prompt: &str,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Option<CompactionOutcome> {
        let split = split_point(&session.history, self.settings.keep_recent.max(1));
        if split == 0 {
            debug!(agent = %self.agent, "Nothing to compact");
            return None;
        }
        let budget = summary_budget(&session.history[..split], self.settings.summary_max_tokens)?;

        let tokens_before = self.estimate(system_prompt, &session.history);
        let (summary, extractive) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(agent = %self.agent, "Compaction cancelled");
                return None;
            }
            summary = self.summarise(&session.history[..split], budget) => summary,
        };

        session.history.splice(..split, [summary_message(&summary)]);
        session.state.record(summary, tokens_before);
        let tokens_after = self.estimate(system_prompt, &session.history);

        if session.persist {
            if let Err(e) = self.store.save(&self.agent, &session.state).await {
                warn!(agent = %self.agent, error = %e, "Failed to persist compaction state");
            }
        }

        info!(
            agent = %self.agent,
            tokens_before,
            tokens_after,
            messages = split,
            compactions = session.state.compactions,
            "History compacted"
        );
        self.events.publish(DomainEvent::Compacted {
            agent: self.agent.clone(),
            tokens_before,
            tokens_after,
            compactions: session.state.compactions,
            timestamp: chrono::Utc::now(),
        });

        Some(CompactionOutcome {
            tokens_before,
            tokens_after,
            messages_compacted: split,
            extractive,
        })
    }

    /// Summarise a range through the provider, falling back to a local
    /// extractive summary. The result never exceeds `budget` bytes.
    async fn summarise(&self, range: &[Message], budget: usize) -> (String, bool) {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SUMMARY_INSTRUCTIONS),
                Message::user(format!(
                    "Summarise in at most {} characters:\n\n{}",
                    budget,
                    render_transcript(range)
                )),
            ],
            temperature: 0.2,
            max_tokens: Some(budget.div_ceil(4) as u32),
            tools: Vec::new(),
        };

        let generated = match self.provider.complete(request).await {
            Ok(response) => response.message.content.trim().to_string(),
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "Summarisation failed, using extractive summary");
                String::new()
            }
        };

        let (text, extractive) = if generated.is_empty() {
            (extractive_summary(range), true)
        } else {
            (generated, false)
        };
        let text = if text.trim().is_empty() {
            "(earlier messages carried no text)".to_string()
        } else {
            text
        };
        (truncate_to(&text, budget).to_string(), extractive)
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("agent", &self.agent)
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .field("store", &self.store.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use tinyreact_core::error::ProviderError;
    use tinyreact_memory::InMemoryStateStore;

    fn settings(threshold: usize, keep_recent: usize) -> CompactionSettings {
        CompactionSettings {
            threshold_tokens: threshold,
            keep_recent,
            summary_max_tokens: 2_000,
        }
    }

    fn manager(
        provider: Arc<ScriptedProvider>,
        settings: CompactionSettings,
        store: Arc<InMemoryStateStore>,
    ) -> MemoryManager {
        MemoryManager::new("mem-test", provider, "mock-model", settings, store, EventBus::default())
    }

    fn long_history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}: {}", "detail ".repeat(40)))
                } else {
                    Message::assistant(format!("answer {i}: {}", "reasoning ".repeat(40)))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn below_threshold_is_a_noop() {
        let provider = Arc::new(ScriptedProvider::text("unused"));
        let store = Arc::new(InMemoryStateStore::new());
        let mm = manager(provider.clone(), settings(50_000, 4), store);

        let mut session = Session::scratch();
        session.history = long_history(6);
        let before = session.history.clone();

        assert!(mm.maybe_compact("system", &mut session, &CancellationToken::new()).await.is_none());
        assert!(mm.maybe_compact("system", &mut session, &CancellationToken::new()).await.is_none());
        assert_eq!(session.history, before);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn compaction_strictly_reduces_and_keeps_recent() {
        let provider = Arc::new(ScriptedProvider::text("The user asked many questions."));
        let store = Arc::new(InMemoryStateStore::new());
        let mm = manager(provider.clone(), settings(100, 4), store.clone());

        let mut session = Session::new();
        mm.initialize(&mut session).await;
        session.history = long_history(12);
        let recent = session.history[8..].to_vec();
        let system_prompt = "You are terse.";

        let outcome = mm.maybe_compact(system_prompt, &mut session, &CancellationToken::new()).await.unwrap();
        assert!(outcome.tokens_after < outcome.tokens_before);
        assert_eq!(outcome.messages_compacted, 8);
        assert!(!outcome.extractive);

        assert_eq!(session.history.len(), 5);
        assert!(compaction::is_summary(&session.history[0]));
        assert!(session.history[0].content.contains("many questions"));
        assert_eq!(&session.history[1..], &recent[..]);
        assert_eq!(session.state.compactions, 1);

        // Summarisation ran without tools.
        let request = provider.last_request().unwrap();
        assert!(request.tools.is_empty());

        let saved = store.load("mem-test").await.unwrap().unwrap();
        assert_eq!(saved.summary, "The user asked many questions.");
    }

    #[tokio::test]
    async fn failed_summarisation_falls_back_to_extractive() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]));
        let store = Arc::new(InMemoryStateStore::new());
        let mm = manager(provider, settings(100, 2), store);

        let mut session = Session::scratch();
        session.history = long_history(8);
        let outcome = mm.compact("", &mut session, &CancellationToken::new()).await.unwrap();
        assert!(outcome.extractive);
        assert!(outcome.tokens_after < outcome.tokens_before);
        assert!(session.history[0].content.contains("user asked: question 0"));
    }

    #[tokio::test]
    async fn scratch_sessions_are_not_persisted() {
        let provider = Arc::new(ScriptedProvider::text("summary"));
        let store = Arc::new(InMemoryStateStore::new());
        let mm = manager(provider, settings(100, 2), store.clone());

        let mut session = Session::scratch();
        session.history = long_history(8);
        mm.compact("", &mut session, &CancellationToken::new()).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn initialize_seeds_history_with_persisted_summary() {
        let store = Arc::new(InMemoryStateStore::new());
        let mut state = CompactionState::default();
        state.record("user prefers metric units".into(), 60_000);
        store.save("mem-test", &state).await.unwrap();

        let mm = manager(Arc::new(ScriptedProvider::text("x")), settings(100, 2), store);
        let mut session = Session::new();
        mm.initialize(&mut session).await;
        mm.initialize(&mut session).await;

        assert_eq!(session.history.len(), 1);
        assert!(session.history[0].content.ends_with("user prefers metric units"));
        assert_eq!(session.state.compactions, 1);
    }

    #[tokio::test]
    async fn short_history_is_never_compacted() {
        let provider = Arc::new(ScriptedProvider::text("summary"));
        let mm = manager(provider.clone(), settings(0, 10), Arc::new(InMemoryStateStore::new()));
        let mut session = Session::scratch();
        session.history = long_history(4);
        assert!(mm.compact("", &mut session, &CancellationToken::new()).await.is_none());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_summarisation_leaves_history_untouched() {
        struct Stalled;

        #[async_trait::async_trait]
        impl Provider for Stalled {
            fn name(&self) -> &str {
                "stalled"
            }

            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<tinyreact_core::provider::ProviderResponse, ProviderError> {
                std::future::pending().await
            }
        }

        let store = Arc::new(InMemoryStateStore::new());
        let mm = MemoryManager::new(
            "mem-test",
            Arc::new(Stalled),
            "mock-model",
            settings(100, 2),
            store.clone(),
            EventBus::default(),
        );
        let mut session = Session::new();
        mm.initialize(&mut session).await;
        session.history = long_history(8);
        let before = session.history.clone();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            trigger.cancel();
        });

        assert!(mm.maybe_compact("system", &mut session, &cancel).await.is_none());
        assert_eq!(session.history, before);
        assert_eq!(session.state.compactions, 0);
        assert!(store.is_empty().await);
    }
}
