//! HTTP API for the chat widget.
//!
//! A thin JSON mapping of the [`ChatOrchestrator`] operations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name and version |
//! | `GET`  | `/health` | Index size, models and session count |
//! | `POST` | `/chat` | `{message, session_id?}` → `{response, session_id, timestamp}` |
//! | `POST` | `/reset` | `{session_id}` clears that conversation |
//! | `POST` | `/refresh` | Reload the corpus; returns the load summary |
//! | `GET`  | `/sessions` | Known session ids |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | empty message / session id | 400 | `bad_request` |
//! | [`Error::ModelMismatch`] | 409 | `index_model_mismatch` |
//! | [`Error::Configuration`] | 409 | `configuration` |
//! | [`Error::CorpusEmpty`] | 422 | `corpus_empty` |
//! | [`Error::CompletionBackend`] | 502 | `completion_failed` |
//! | anything else | 500 | `internal` |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the widget can be
//! embedded in any page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::chat::{ChatOrchestrator, Health};
use crate::error::Error;
use crate::models::LoadSummary;

/// Build the router around a shared orchestrator.
pub fn router(orchestrator: Arc<ChatOrchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/reset", post(handle_reset))
        .route("/refresh", post(handle_refresh))
        .route("/sessions", get(handle_sessions))
        .layer(cors)
        .with_state(orchestrator)
}

/// Serve the API on `bind` until the process is terminated.
pub async fn run_server(orchestrator: Arc<ChatOrchestrator>, bind: &str) -> anyhow::Result<()> {
    let app = router(orchestrator);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "chat server listening");
    println!("Chat server listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::ModelMismatch { .. } => (StatusCode::CONFLICT, "index_model_mismatch"),
            Error::Configuration(_) => (StatusCode::CONFLICT, "configuration"),
            Error::CorpusEmpty { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "corpus_empty"),
            Error::CompletionBackend(_) => (StatusCode::BAD_GATEWAY, "completion_failed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
}

async fn handle_root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    health: Health,
}

async fn handle_health(
    State(chat): State<Arc<ChatOrchestrator>>,
) -> Result<Json<HealthResponse>, AppError> {
    let health = chat.health().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        health,
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
    timestamp: DateTime<Utc>,
}

async fn handle_chat(
    State(chat): State<Arc<ChatOrchestrator>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let session_id = match req.session_id.filter(|s| !s.trim().is_empty()) {
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let response = chat.send_message(&session_id, message).await?;
    Ok(Json(ChatResponse {
        response,
        session_id,
        timestamp: Utc::now(),
    }))
}

// ============ POST /reset ============

#[derive(Deserialize)]
struct ResetRequest {
    session_id: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    session_id: String,
}

async fn handle_reset(
    State(chat): State<Arc<ChatOrchestrator>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(bad_request("session_id must not be empty"));
    }
    chat.reset_session(&req.session_id).await;
    Ok(Json(StatusResponse {
        status: "reset",
        session_id: req.session_id,
    }))
}

// ============ POST /refresh and GET /sessions ============

async fn handle_refresh(
    State(chat): State<Arc<ChatOrchestrator>>,
) -> Result<Json<LoadSummary>, AppError> {
    Ok(Json(chat.refresh_corpus().await?))
}

#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<String>,
}

async fn handle_sessions(State(chat): State<Arc<ChatOrchestrator>>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: chat.sessions(),
    })
}
