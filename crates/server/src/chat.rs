//! Conversation HTTP surface.
//!
//! Tool failures inside a turn never surface here; they travel back as
//! `falha` action records with a 200. This module only maps whole-turn
//! failures (unknown session, LLM or store outage) onto HTTP statuses.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use selly_agent::orchestrator::TurnOrchestrator;
use selly_core::domain::session::SessionId;
use selly_core::errors::{ApplicationError, InterfaceError};

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<TurnOrchestrator>,
}

pub fn router(orchestrator: Arc<TurnOrchestrator>) -> Router {
    Router::new()
        .route("/start-session", post(start_session))
        .route("/message", post(message))
        .with_state(ChatState { orchestrator })
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub messages: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub reply: String,
    pub actions: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

type HandlerError = (StatusCode, Json<ErrorBody>);

pub async fn start_session(
    State(state): State<ChatState>,
) -> Result<Json<StartSessionResponse>, HandlerError> {
    let opening = state.orchestrator.start_session().await.map_err(reject)?;

    info!(
        event_name = "chat.session.opened",
        session_id = %opening.session_id,
        "session opened over http"
    );
    Ok(Json(StartSessionResponse {
        session_id: opening.session_id.0,
        messages: opening.greeting,
    }))
}

pub async fn message(
    State(state): State<ChatState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, HandlerError> {
    let session_id = SessionId(request.session_id);
    let turn = state.orchestrator.handle_message(&session_id, &request.message).await.map_err(reject)?;

    let actions = turn
        .actions
        .iter()
        .map(|action| json!({ "action": action.name, "result": action.result }))
        .collect();
    Ok(Json(MessageResponse { reply: turn.reply, actions }))
}

fn reject(application_error: ApplicationError) -> HandlerError {
    let correlation_id = Uuid::new_v4().to_string();
    let interface = application_error.into_interface(correlation_id.clone());

    let status = match &interface {
        InterfaceError::NotFound { .. } => {
            warn!(event_name = "chat.request.not_found", %correlation_id, %interface, "rejected request");
            StatusCode::NOT_FOUND
        }
        InterfaceError::ServiceUnavailable { .. } => {
            error!(event_name = "chat.request.unavailable", %correlation_id, %interface, "rejected request");
            StatusCode::SERVICE_UNAVAILABLE
        }
        InterfaceError::Internal { .. } => {
            error!(event_name = "chat.request.internal", %correlation_id, %interface, "rejected request");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(ErrorBody { error: interface.user_message().to_string(), correlation_id }))
}
