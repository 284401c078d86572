//! HTTP request handlers

use super::sse::{sse_stream, InitEvent};
use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, ModelInfo, ModelsResponse, SessionListResponse,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::chat::{ChatError, ChatSession};
use crate::llm::all_models;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/delete", post(delete_session))
        .route("/api/models", get(list_models))
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<ChatSession>, AppError> {
    state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Sessions
// ============================================================

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.sessions.list().await,
    })
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session: session.summary().await,
            transcript: session.transcript().await,
        }),
    )
}

async fn get_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(SessionResponse {
        session: session.summary().await,
        transcript: session.transcript().await,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.remove(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id).await?;

    // Subscribe before the snapshot so no change falls between them
    let broadcast_rx = session.subscribe_events();
    let init = InitEvent {
        transcript: session.transcript().await,
        awaiting_response: session.is_awaiting_response(),
    };

    Ok(sse_stream(init, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let session = find_session(&state, id).await?;

    let pending = session.begin(&req.text).await.map_err(|e| match e {
        ChatError::Busy => AppError::Conflict(e.to_string()),
    })?;

    let Some(pending) = pending else {
        return Ok((StatusCode::OK, Json(ChatResponse { queued: false })));
    };

    // Detached so a disconnecting client cannot cancel the request
    tokio::spawn(async move {
        pending.complete().await;
    });

    Ok((StatusCode::ACCEPTED, Json(ChatResponse { queued: true })))
}

async fn reset_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    let session = find_session(&state, id).await?;
    session.reset().await;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = all_models()
        .iter()
        .map(|m| ModelInfo {
            id: m.id.to_string(),
            description: m.description.to_string(),
            context_window: m.context_window,
        })
        .collect();

    Json(ModelsResponse {
        models,
        default: state.sessions.model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("karbo-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

/// `Path` whose rejection is reported as a JSON [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
struct ApiPath<T>(T);

/// `Json` whose rejection is reported as a JSON [`AppError`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct ApiJson<T>(T);

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
