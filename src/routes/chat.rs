//! Patient chat routes (public) and the doctor's inbox.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::DoctorUser;
use crate::routes::error::ApiError;
use crate::services::chat::{self, ChatMessage, ChatThread, MessageKind, Sender};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartChat {
    pub name: String,
    pub phone: String,
}

#[derive(Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub kind: MessageKind,
    pub content: String,
}

// =============================================================================
// PATIENT SIDE
// =============================================================================

/// `POST /api/chat/start`
pub async fn start(State(state): State<AppState>, Json(body): Json<StartChat>) -> Result<Json<ChatThread>, ApiError> {
    Ok(Json(chat::start_chat(&state, &body.name, &body.phone).await?))
}

/// `GET /api/chat/{phone}/messages`: oldest first.
pub async fn messages(State(state): State<AppState>, Path(phone): Path<String>) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(chat::messages(&state.pool, &phone).await?))
}

/// `POST /api/chat/{phone}/messages`
pub async fn patient_send(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    state.chat_limiter.check_and_record(&phone)?;
    let message = chat::send(&state, &phone, Sender::Patient, body.kind, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/chat/{phone}/read`: the patient has seen the doctor's replies.
pub async fn patient_read(State(state): State<AppState>, Path(phone): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = chat::mark_read(&state, &phone, Sender::Patient).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// `DELETE /api/chat/{phone}/messages/{id}`
pub async fn delete_message(
    State(state): State<AppState>,
    Path((phone, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    chat::delete_message(&state, &phone, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// DOCTOR INBOX
// =============================================================================

/// `GET /api/chats`: threads, most recently active first.
pub async fn threads(State(state): State<AppState>, _doctor: DoctorUser) -> Result<Json<Vec<ChatThread>>, ApiError> {
    Ok(Json(chat::threads(&state.pool).await?))
}

/// `POST /api/chats/{phone}/reply`
pub async fn reply(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Path(phone): Path<String>,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = chat::send(&state, &phone, Sender::Doctor, body.kind, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/chats/{phone}/open`: clear the unread badge and mark the
/// patient's messages read.
pub async fn open(State(state): State<AppState>, _doctor: DoctorUser, Path(phone): Path<String>) -> Result<StatusCode, ApiError> {
    chat::open_thread(&state, &phone).await?;
    chat::mark_read(&state, &phone, Sender::Doctor).await?;
    Ok(StatusCode::NO_CONTENT)
}
