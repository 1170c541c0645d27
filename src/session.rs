//! In-memory conversation sessions.
//!
//! Sessions are created lazily by the first message with a new id and hold a bounded,
//! oldest-first message history. Each session sits behind its own
//! `tokio::sync::Mutex`; the chat orchestrator holds that lock for a whole
//! turn so two concurrent turns of one session never interleave, while
//! different sessions proceed independently.
//!
//! [`SessionStore::reset`] destroys a session: its history is cleared and
//! the id is forgotten, so the map only holds conversations that are live.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::models::{Message, Role};

/// One conversation thread.
#[derive(Debug)]
pub struct Session {
    id: String,
    messages: VecDeque<Message>,
    max_messages: usize,
}

impl Session {
    fn new(id: &str, max_messages: usize) -> Self {
        Self {
            id: id.to_string(),
            messages: VecDeque::new(),
            max_messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a message, dropping the oldest ones beyond the bound.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push_back(Message::new(role, content));
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }

    /// The most recent `max_turns` messages, oldest first.
    pub fn recent(&self, max_turns: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(max_turns);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Session id → session map.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Session>>>>,
    max_messages: usize,
}

impl SessionStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_messages: max_messages.max(1),
        }
    }

    /// Shared handle to a session, creating it if the id is new.
    pub fn handle(&self, session_id: &str) -> Arc<AsyncMutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(Session::new(session_id, self.max_messages)))
            })
            .clone()
    }

    pub async fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        self.handle(session_id).lock().await.push(role, content);
    }

    /// Most recent `max_turns` messages; an unknown id reads as an empty
    /// session without being stored.
    pub async fn history(&self, session_id: &str, max_turns: usize) -> Vec<Message> {
        match self.get(session_id) {
            Some(handle) => handle.lock().await.recent(max_turns),
            None => Vec::new(),
        }
    }

    /// Clear one session and forget its id. Returns `false` for an unknown id.
    ///
    /// Waits for an in-flight turn of that session to finish first.
    pub async fn reset(&self, session_id: &str) -> bool {
        let Some(handle) = self.get(session_id) else {
            return false;
        };
        let mut session = handle.lock().await;
        session.clear();
        self.discard(session_id, &handle);
        true
    }

    /// Drop `session_id` from the map if it still refers to `handle`.
    ///
    /// Used when a first turn fails so an empty session is not kept around.
    pub fn discard(&self, session_id: &str, handle: &Arc<AsyncMutex<Session>>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(session_id);
        }
    }

    fn get(&self, session_id: &str) -> Option<Arc<AsyncMutex<Session>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known session ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
