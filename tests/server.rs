//! HTTP API tests against a server bound to an ephemeral port.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use portfolio_chat::chat::{AppContext, ChatOrchestrator};
use portfolio_chat::completion::{CompletionBackend, DisabledBackend};
use portfolio_chat::config::{parse_config, Config};
use portfolio_chat::embedding::HashingProvider;
use portfolio_chat::extract::FileExtractor;
use portfolio_chat::index::MemoryIndex;
use portfolio_chat::knowledge::KnowledgeBase;
use portfolio_chat::prompt::Prompt;
use portfolio_chat::server::router;
use portfolio_chat::session::SessionStore;
use portfolio_chat::Result;

/// Echoes the newest message and how many messages the prompt carried.
struct EchoBackend;

#[async_trait]
impl CompletionBackend for EchoBackend {
    async fn complete(&self, prompt: &Prompt, _model: &str, _max_tokens: u32) -> Result<String> {
        let last = prompt.messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("echo({}): {}", prompt.messages.len(), last))
    }
}

fn config_for(dir: &Path) -> Config {
    parse_config(&format!(
        "[index]\npath = \"{0}/index.sqlite\"\n[corpus]\nroot = \"{0}/about_me\"\n",
        dir.display()
    ))
    .unwrap()
}

async fn spawn_app(backend: Arc<dyn CompletionBackend>) -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("about_me")).unwrap();
    fs::write(
        tmp.path().join("about_me/bio.md"),
        "Sam maintains open source Rust crates.",
    )
    .unwrap();

    let config = config_for(tmp.path());
    let kb = KnowledgeBase::new(
        Arc::new(MemoryIndex::new()),
        Arc::new(HashingProvider::new(64)),
        Arc::new(FileExtractor::default()),
        config.corpus.clone(),
        config.chunking.clone(),
    )
    .unwrap();
    kb.refresh().await.unwrap();

    let ctx = AppContext::new(config, kb, SessionStore::new(20));
    let chat = Arc::new(ChatOrchestrator::new(&ctx, backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(chat)).await.unwrap();
    });
    (tmp, format!("http://{}", addr))
}

#[tokio::test]
async fn test_chat_assigns_session_and_keeps_history() {
    let (_tmp, base) = spawn_app(Arc::new(EchoBackend)).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/chat", base))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["response"], "echo(1): hello");
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());
    assert!(first["timestamp"].is_string());

    let second: Value = client
        .post(format!("{}/chat", base))
        .json(&json!({"message": "and then?", "session_id": session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["response"], "echo(3): and then?");

    let sessions: Value = client
        .get(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["sessions"], json!([session_id]));

    let reset = client
        .post(format!("{}/reset", base))
        .json(&json!({"session_id": session_id}))
        .send()
        .await
        .unwrap();
    assert!(reset.status().is_success());

    let sessions: Value = client
        .get(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["sessions"], json!([]));

    let after: Value = client
        .post(format!("{}/chat", base))
        .json(&json!({"message": "fresh", "session_id": session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["response"], "echo(1): fresh");
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let (_tmp, base) = spawn_app(Arc::new(EchoBackend)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_completion_failure_maps_to_bad_gateway() {
    let (_tmp, base) = spawn_app(Arc::new(DisabledBackend)).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"message": "hi", "session_id": "s1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "completion_failed");
}

#[tokio::test]
async fn test_health_and_refresh() {
    let (tmp, base) = spawn_app(Arc::new(EchoBackend)).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["index_size"], 1);
    assert_eq!(health["embedding_model"], "hashing-64");

    fs::write(tmp.path().join("about_me/talks.md"), "Conference talk on tracing").unwrap();
    let summary: Value = client
        .post(format!("{}/refresh", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["documents_loaded"], 2);
    assert_eq!(summary["chunks_reused"], 1);

    fs::remove_file(tmp.path().join("about_me/bio.md")).unwrap();
    fs::remove_file(tmp.path().join("about_me/talks.md")).unwrap();
    let resp = client.post(format!("{}/refresh", base)).send().await.unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "corpus_empty");
}

#[tokio::test]
async fn test_root_reports_service() {
    let (_tmp, base) = spawn_app(Arc::new(EchoBackend)).await;
    let info: Value = reqwest::get(format!("{}/", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["service"], "portfolio-chat");
}
