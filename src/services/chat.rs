//! Chat service: patient-doctor message threads keyed by phone.
//!
//! DESIGN
//! ======
//! A thread row carries the inbox summary (last message, unread flag); the
//! messages table holds the conversation. Every send updates both in one
//! transaction and then pushes `chat:message` on the thread's topic and
//! `chats:changed` on the doctor's inbox topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, to_data};
use crate::services::hub::{self, Topic};
use crate::state::AppState;

/// Upper bound on message content, text or base64 media.
pub const MAX_CONTENT_CHARS: usize = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("message too large ({0} characters)")]
    TooLarge(usize),
    #[error("chat not found: {0}")]
    ThreadNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::TooLarge(_) => "E_TOO_LARGE",
            Self::ThreadNotFound(_) | Self::MessageNotFound(_) => "E_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Patient,
    Doctor,
}

impl Sender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Patient => Self::Doctor,
            Self::Doctor => Self::Patient,
        }
    }

    fn parse(raw: &str) -> Self {
        if raw == "doctor" { Self::Doctor } else { Self::Patient }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Voice,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "image" => Self::Image,
            "voice" => Self::Voice,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub phone: String,
    pub sender: Sender,
    pub kind: MessageKind,
    pub text: String,
    pub media_data: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const MESSAGE_COLUMNS: &str = "id, phone, sender, kind, text, media_data, read, created_at";

fn message_from_row(row: &PgRow) -> Result<ChatMessage, sqlx::Error> {
    let sender: String = row.try_get("sender")?;
    let kind: String = row.try_get("kind")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        phone: row.try_get("phone")?,
        sender: Sender::parse(&sender),
        kind: MessageKind::parse(&kind),
        text: row.try_get("text")?,
        media_data: row.try_get("media_data")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatThread {
    pub phone: String,
    pub patient_name: String,
    pub last_message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub unread: bool,
}

fn thread_from_row(row: &PgRow) -> Result<ChatThread, sqlx::Error> {
    Ok(ChatThread {
        phone: row.try_get("phone")?,
        patient_name: row.try_get("patient_name")?,
        last_message: row.try_get("last_message")?,
        last_updated: row.try_get("last_updated")?,
        unread: row.try_get("unread")?,
    })
}

/// Inbox preview for a new message.
#[must_use]
pub fn last_message(sender: Sender, kind: MessageKind, content: &str) -> String {
    match (sender, kind) {
        (Sender::Patient, MessageKind::Text) => format!("Patient: {content}"),
        (Sender::Patient, MessageKind::Image) => "📷 Image".to_owned(),
        (Sender::Patient, MessageKind::Voice) => "🎤 Voice".to_owned(),
        (Sender::Doctor, MessageKind::Text) => format!("Dr: {content}"),
        (Sender::Doctor, MessageKind::Image) => "Dr: 📷 Image".to_owned(),
        (Sender::Doctor, MessageKind::Voice) => "Dr: 🎤 Voice".to_owned(),
    }
}

/// Trim and bound message content.
///
/// # Errors
///
/// `Invalid` for empty content, `TooLarge` above [`MAX_CONTENT_CHARS`].
pub fn validate_content(content: &str) -> Result<&str, ChatError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ChatError::Invalid("message is empty"));
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(ChatError::TooLarge(len));
    }
    Ok(content)
}

// =============================================================================
// WRITES
// =============================================================================

/// Open (or reopen) the thread for a patient.
///
/// # Errors
///
/// `Invalid` for a blank name or phone, or a database error.
pub async fn start_chat(state: &AppState, name: &str, phone: &str) -> Result<ChatThread, ChatError> {
    let (name, phone) = (name.trim(), phone.trim());
    if name.is_empty() || phone.is_empty() {
        return Err(ChatError::Invalid("name and phone are required"));
    }
    let row = sqlx::query(
        "INSERT INTO chat_threads (phone, patient_name, last_updated, unread)
         VALUES ($1, $2, now(), TRUE)
         ON CONFLICT (phone) DO UPDATE
             SET patient_name = EXCLUDED.patient_name, last_updated = now(), unread = TRUE
         RETURNING phone, patient_name, last_message, last_updated, unread",
    )
    .bind(phone)
    .bind(name)
    .fetch_one(&state.pool)
    .await?;
    let thread = thread_from_row(&row)?;
    info!(%phone, "chat started");
    hub::notify(state, &Topic::Chats, "chats:changed", Data::new()).await;
    Ok(thread)
}

/// Append a message to a thread.
///
/// # Errors
///
/// Content validation errors, `ThreadNotFound` if the chat was never
/// started, or a database error.
pub async fn send(
    state: &AppState,
    phone: &str,
    sender: Sender,
    kind: MessageKind,
    content: &str,
) -> Result<ChatMessage, ChatError> {
    let content = validate_content(content)?;
    let (text, media) = match kind {
        MessageKind::Text => (content, ""),
        MessageKind::Image | MessageKind::Voice => ("", content),
    };
    let preview = last_message(sender, kind, content);

    let mut tx = state.pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE chat_threads
         SET last_message = $2, last_updated = now(), unread = (unread OR $3)
         WHERE phone = $1",
    )
    .bind(phone)
    .bind(&preview)
    .bind(sender == Sender::Patient)
    .execute(tx.as_mut())
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ChatError::ThreadNotFound(phone.to_owned()));
    }
    let row = sqlx::query(&format!(
        "INSERT INTO chat_messages (phone, sender, kind, text, media_data)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(phone)
    .bind(sender.as_str())
    .bind(kind.as_str())
    .bind(text)
    .bind(media)
    .fetch_one(tx.as_mut())
    .await?;
    tx.commit().await?;

    let message = message_from_row(&row)?;
    info!(%phone, id = %message.id, sender = sender.as_str(), kind = kind.as_str(), "chat message sent");
    hub::notify(state, &Topic::Chat(phone.to_owned()), "chat:message", to_data(&message)).await;
    hub::notify(state, &Topic::Chats, "chats:changed", Data::new()).await;
    Ok(message)
}

/// Mark the other party's unread messages as read by `reader`.
/// Returns how many messages changed.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn mark_read(state: &AppState, phone: &str, reader: Sender) -> Result<u64, ChatError> {
    let result = sqlx::query("UPDATE chat_messages SET read = TRUE WHERE phone = $1 AND sender = $2 AND NOT read")
        .bind(phone)
        .bind(reader.other().as_str())
        .execute(&state.pool)
        .await?;
    let changed = result.rows_affected();
    if changed > 0 {
        let mut data = Data::new();
        data.insert("reader".into(), Value::from(reader.as_str()));
        hub::notify(state, &Topic::Chat(phone.to_owned()), "chat:read", data).await;
    }
    Ok(changed)
}

/// Doctor opened the thread: clear the inbox badge.
///
/// # Errors
///
/// `ThreadNotFound` for an unknown phone.
pub async fn open_thread(state: &AppState, phone: &str) -> Result<(), ChatError> {
    let result = sqlx::query("UPDATE chat_threads SET unread = FALSE WHERE phone = $1")
        .bind(phone)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ChatError::ThreadNotFound(phone.to_owned()));
    }
    hub::notify(state, &Topic::Chats, "chats:changed", Data::new()).await;
    Ok(())
}

/// # Errors
///
/// `MessageNotFound` when no such message exists in the thread.
pub async fn delete_message(state: &AppState, phone: &str, id: Uuid) -> Result<(), ChatError> {
    let result = sqlx::query("DELETE FROM chat_messages WHERE phone = $1 AND id = $2")
        .bind(phone)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ChatError::MessageNotFound(id));
    }
    let mut data = Data::new();
    data.insert("id".into(), Value::from(id.to_string()));
    hub::notify(state, &Topic::Chat(phone.to_owned()), "chat:deleted", data).await;
    Ok(())
}

// =============================================================================
// READS
// =============================================================================

/// Conversation, oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn messages(pool: &PgPool, phone: &str) -> Result<Vec<ChatMessage>, ChatError> {
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE phone = $1 ORDER BY created_at ASC"
    ))
    .bind(phone)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(message_from_row).collect::<Result<_, _>>()?)
}

/// Doctor inbox, most recently active first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn threads(pool: &PgPool) -> Result<Vec<ChatThread>, ChatError> {
    let rows = sqlx::query(
        "SELECT phone, patient_name, last_message, last_updated, unread
         FROM chat_threads ORDER BY last_updated DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(thread_from_row).collect::<Result<_, _>>()?)
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
