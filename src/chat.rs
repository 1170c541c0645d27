//! Application context and chat orchestration.
//!
//! [`AppContext`] bundles the configuration, knowledge base and session
//! store; it is built once from [`Config`] and passed to whatever needs it.
//! [`ChatOrchestrator`] runs one conversational turn:
//!
//! 1. lock the session for the whole turn
//! 2. retrieve the top `k` chunks for the message
//! 3. take the most recent history
//! 4. assemble the prompt
//! 5. call the completion backend, retrying once on failure or timeout
//! 6. record the user message and the reply
//!
//! A turn that fails in any step leaves the session untouched.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::CompletionBackend;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::extract::FileExtractor;
use crate::index::SqliteIndex;
use crate::knowledge::KnowledgeBase;
use crate::models::{LoadSummary, Role};
use crate::prompt::{persona, Prompt};
use crate::session::{Session, SessionStore};

/// Shared state for one running assistant.
pub struct AppContext {
    pub config: Config,
    pub knowledge: Arc<KnowledgeBase>,
    pub sessions: Arc<SessionStore>,
}

impl AppContext {
    /// Open the persistent index and the configured embedding provider.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let index = Arc::new(SqliteIndex::open(&config.index.path).await?);
        let extractor = Arc::new(FileExtractor::new(config.corpus.max_file_bytes));

        let knowledge = KnowledgeBase::new(
            index,
            embedder,
            extractor,
            config.corpus.clone(),
            config.chunking.clone(),
        )?
        .with_batch_size(config.embedding.batch_size)
        .with_min_score(config.retrieval.min_score);

        let sessions = SessionStore::new(config.session.max_messages);
        Ok(Self::new(config, knowledge, sessions))
    }

    pub fn new(config: Config, knowledge: KnowledgeBase, sessions: SessionStore) -> Self {
        Self {
            config,
            knowledge: Arc::new(knowledge),
            sessions: Arc::new(sessions),
        }
    }
}

/// Snapshot reported by [`ChatOrchestrator::health`].
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub index_size: usize,
    /// Model the stored index was built with, if any.
    pub indexed_model: Option<String>,
    pub embedding_model: String,
    pub completion_model: String,
    pub active_sessions: usize,
}

pub struct ChatOrchestrator {
    knowledge: Arc<KnowledgeBase>,
    sessions: Arc<SessionStore>,
    backend: Arc<dyn CompletionBackend>,
    persona: String,
    model: String,
    max_tokens: u32,
    top_k: usize,
    history_turns: usize,
    timeout: Duration,
}

impl ChatOrchestrator {
    pub fn new(ctx: &AppContext, backend: Arc<dyn CompletionBackend>) -> Self {
        let config = &ctx.config;
        Self {
            knowledge: ctx.knowledge.clone(),
            sessions: ctx.sessions.clone(),
            backend,
            persona: persona(
                &config.assistant.name,
                config.assistant.system_prompt.as_deref(),
            ),
            model: config.completion.model.clone(),
            max_tokens: config.completion.max_tokens,
            top_k: config.retrieval.top_k,
            history_turns: config.session.history_turns,
            timeout: Duration::from_secs(config.completion.timeout_secs),
        }
    }

    /// Bound on each completion attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer `text` within session `session_id` and record the exchange.
    ///
    /// # Errors
    ///
    /// Retrieval errors propagate unchanged. [`Error::CompletionBackend`]
    /// when both completion attempts fail; the session is not modified.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<String> {
        let handle = self.sessions.handle(session_id);
        let mut session = handle.lock().await;

        let result = self.run_turn(&mut session, text).await;
        if result.is_err() && session.is_empty() {
            self.sessions.discard(session_id, &handle);
        }
        result
    }

    async fn run_turn(&self, session: &mut Session, text: &str) -> Result<String> {
        let context = self.knowledge.retrieve(text, self.top_k).await?;
        let recent = session.recent(self.history_turns);
        let prompt = Prompt::assemble(&self.persona, &context, &recent, text);

        let reply = self.complete_with_retry(&prompt).await?;

        session.push(Role::User, text);
        session.push(Role::Assistant, reply.clone());
        info!(
            session = session.id(),
            context_chunks = context.len(),
            history = recent.len(),
            "answered message"
        );
        Ok(reply)
    }

    async fn complete_with_retry(&self, prompt: &Prompt) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=2 {
            let call = self.backend.complete(prompt, &self.model, self.max_tokens);
            let err = match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => e,
                Err(_) => Error::CompletionBackend(format!(
                    "no reply within {}s",
                    self.timeout.as_secs_f32()
                )),
            };
            warn!(attempt, error = %err, "completion attempt failed");
            last_err = Some(err);
        }
        Err(last_err
            .unwrap_or_else(|| Error::CompletionBackend("completion failed".to_string())))
    }

    /// Rebuild the index from the configured corpus root.
    pub async fn refresh_corpus(&self) -> Result<LoadSummary> {
        self.knowledge.refresh().await
    }

    /// Destroy a session. Returns `false` when the id was not known.
    pub async fn reset_session(&self, session_id: &str) -> bool {
        self.sessions.reset(session_id).await
    }

    pub async fn health(&self) -> Result<Health> {
        Ok(Health {
            index_size: self.knowledge.index_size().await?,
            indexed_model: self.knowledge.indexed_model().await?.map(|m| m.name),
            embedding_model: self.knowledge.active_model().name,
            completion_model: self.model.clone(),
            active_sessions: self.sessions.len(),
        })
    }

    /// Known session ids.
    pub fn sessions(&self) -> Vec<String> {
        self.sessions.ids()
    }
}
