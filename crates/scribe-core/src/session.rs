//! Orchestrator sessions
//!
//! One session per conversation. A session exclusively owns its linked
//! document set and its conversation history; the [`SessionManager`] hands
//! out sessions by id and never shares state between them.

use dashmap::DashMap;
use scribe_types::{ConversationHistory, DocumentId, LinkedDocumentSet, Turn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Conversation-scoped state
#[derive(Debug, Clone)]
pub struct OrchestratorSession {
    id: String,
    user_id: String,
    linked: LinkedDocumentSet,
    history: ConversationHistory,
}

impl OrchestratorSession {
    /// Create session
    #[must_use]
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            linked: LinkedDocumentSet::new(),
            history: ConversationHistory::new(max_turns),
        }
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning user
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Linked documents
    #[inline]
    #[must_use]
    pub fn linked_documents(&self) -> &LinkedDocumentSet {
        &self.linked
    }

    /// Link a document; `false` when the set is full
    pub fn link_document(&mut self, id: impl Into<DocumentId>) -> bool {
        self.linked.add(id)
    }

    /// Unlink a document; idempotent
    pub fn unlink_document(&mut self, id: &DocumentId) -> bool {
        self.linked.remove(id)
    }

    /// Conversation history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Seed an empty history with turns supplied by the caller
    pub fn seed_history(&mut self, turns: &[Turn]) {
        if self.history.is_empty() {
            self.history.extend(turns.iter().cloned());
        }
    }

    /// Record one processed exchange
    pub fn record_exchange(&mut self, ask: impl Into<String>, reply: impl Into<String>) {
        self.history.push(Turn::user(ask));
        self.history.push(Turn::assistant(reply));
    }
}

/// Shared handle to a session
pub type SessionHandle = Arc<Mutex<OrchestratorSession>>;

/// Session registry keyed by session id
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, SessionHandle>,
    max_turns: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(scribe_types::DEFAULT_MAX_TURNS)
    }
}

impl SessionManager {
    /// Create manager; sessions keep at most `max_turns` turns
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns,
        }
    }

    /// Start a new session with a fresh id
    #[must_use]
    pub fn create(&self, user_id: &str) -> (String, SessionHandle) {
        let id = ulid::Ulid::new().to_string();
        let handle = self.get_or_create(&id, user_id);
        (id, handle)
    }

    /// Session for `id`, created on first use
    #[must_use]
    pub fn get_or_create(&self, id: &str, user_id: &str) -> SessionHandle {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = id, user_id, "session created");
                Arc::new(Mutex::new(OrchestratorSession::new(
                    id,
                    user_id,
                    self.max_turns,
                )))
            })
            .clone()
    }

    /// Existing session
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Drop a session
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
