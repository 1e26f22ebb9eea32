//! WebSocket handler: live-update subscriptions and chat.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Frames published on subscribed hub topics → forward to client
//!
//! Sockets opened with a ticket carry the ticket's principal. Sockets opened
//! without one are public: they may follow one day's appointment board and
//! one chat thread, the first phone they subscribe to or send from.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and `role`
//! 2. Client sends `topic:*` / `chat:*` frames → dispatch → reply
//! 3. Services publish `<entity>:changed` frames → forwarded as they arrive
//! 4. Close → drop every subscription

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, Status, to_data};
use crate::services::chat::{self, MessageKind, Sender};
use crate::services::hub::{self, Topic};
use crate::services::session::{self, Principal, Role};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
enum WsError {
    #[error("not allowed to {0}")]
    Forbidden(String),
    #[error("unknown topic: {0}")]
    InvalidTopic(String),
    #[error("{0} required")]
    MissingField(&'static str),
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
}

impl ErrorCode for WsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::InvalidTopic(_) | Self::MissingField(_) => "E_INVALID_INPUT",
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
        }
    }
}

/// Per-connection identity and subscriptions.
struct Conn {
    client_id: Uuid,
    principal: Option<Principal>,
    /// Chat thread a public socket is bound to.
    phone: Option<String>,
    tx: mpsc::Sender<Frame>,
}

impl Conn {
    fn role(&self) -> Option<Role> {
        self.principal.as_ref().map(|p| p.role)
    }

    /// Phone of the patient on the other end, if this is a patient socket.
    fn patient_phone(&self) -> Option<&str> {
        match &self.principal {
            Some(p) if p.role == Role::Patient => Some(p.subject.as_str()),
            Some(_) => None,
            None => self.phone.as_deref(),
        }
    }

    /// Public and patient sockets may only touch their own thread. A public
    /// socket claims the first phone it asks for.
    fn claim_phone(&mut self, phone: &str) -> bool {
        match self.role() {
            Some(Role::Doctor) => true,
            Some(Role::Staff) => false,
            Some(Role::Patient) => self.patient_phone() == Some(phone),
            None => match &self.phone {
                Some(bound) => bound == phone,
                None => {
                    self.phone = Some(phone.to_owned());
                    true
                }
            },
        }
    }

    fn may_subscribe(&mut self, topic: &Topic) -> bool {
        if self.principal.is_none() && !topic.is_public() {
            return false;
        }
        match topic {
            Topic::Appointments(_) => true,
            Topic::Chat(phone) => self.claim_phone(phone),
            Topic::Chats => self.role() == Some(Role::Doctor),
            Topic::Orders | Topic::Inventory | Topic::Holidays | Topic::Staff => {
                self.role().is_some_and(|r| r.satisfies(Role::Staff))
            }
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /api/ws?ticket=`. The ticket is optional; without it the socket is
/// public.
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let principal = match params.get("ticket").map(String::as_str).filter(|t| !t.is_empty()) {
        None => None,
        Some(ticket) => match session::consume_ws_ticket(&state.pool, ticket).await {
            Ok(Some(principal)) => Some(principal),
            Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
            Err(e) => {
                tracing::error!(error = %e, "ws ticket validation failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
            }
        },
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, principal))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, principal: Option<Principal>) {
    let (tx, mut client_rx) = mpsc::channel::<Frame>(256);
    let mut conn = Conn { client_id: Uuid::new_v4(), principal, phone: None, tx };
    let client_id = conn.client_id;
    let role = conn.role().map_or("public", Role::as_str);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("role", role);
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!(%client_id, role, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &mut conn, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    hub::unsubscribe_all(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(state: &AppState, conn: &mut Conn, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };
    req.from = conn.principal.as_ref().map(|p| p.subject.clone());
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "topic" => handle_topic(state, conn, &req).await,
        "chat" => handle_chat(state, conn, &req).await,
        other => Err(req.error_from(&WsError::UnknownSyscall(other.to_owned()))),
    };
    vec![result.unwrap_or_else(|err| err)]
}

async fn handle_topic(state: &AppState, conn: &mut Conn, req: &Frame) -> Result<Frame, Frame> {
    let raw = req.str_field("topic").ok_or_else(|| req.error_from(&WsError::MissingField("topic")))?;
    let topic = Topic::parse(raw).ok_or_else(|| req.error_from(&WsError::InvalidTopic(raw.to_owned())))?;

    match req.op() {
        "subscribe" => {
            if !conn.may_subscribe(&topic) {
                return Err(req.error_from(&WsError::Forbidden(format!("subscribe to {topic}"))));
            }
            hub::subscribe(state, &topic, conn.client_id, conn.tx.clone()).await;
            Ok(req.done_with(Data::from([("topic".to_owned(), serde_json::json!(topic.to_string()))])))
        }
        "unsubscribe" => {
            hub::unsubscribe(state, &topic, conn.client_id).await;
            Ok(req.done())
        }
        op => Err(req.error_from(&WsError::UnknownSyscall(format!("topic:{op}")))),
    }
}

async fn handle_chat(state: &AppState, conn: &mut Conn, req: &Frame) -> Result<Frame, Frame> {
    let phone = req
        .str_field("phone")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .or_else(|| conn.patient_phone().map(str::to_owned))
        .ok_or_else(|| req.error_from(&WsError::MissingField("phone")))?;
    if !conn.claim_phone(&phone) {
        return Err(req.error_from(&WsError::Forbidden(format!("use chat {phone}"))));
    }
    let side = if conn.role() == Some(Role::Doctor) { Sender::Doctor } else { Sender::Patient };

    match req.op() {
        "send" => {
            if side == Sender::Patient {
                state.chat_limiter.check_and_record(&phone).map_err(|e| req.error_from(&e))?;
            }
            let kind = match req.str_field("kind") {
                Some("image") => MessageKind::Image,
                Some("voice") => MessageKind::Voice,
                _ => MessageKind::Text,
            };
            let content = req.str_field("content").unwrap_or_default();
            let message = chat::send(state, &phone, side, kind, content)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(req.done_with(to_data(&message)))
        }
        "read" => {
            let updated = chat::mark_read(state, &phone, side).await.map_err(|e| req.error_from(&e))?;
            Ok(req.done_with(Data::from([("updated".to_owned(), serde_json::json!(updated))])))
        }
        op => Err(req.error_from(&WsError::UnknownSyscall(format!("chat:{op}")))),
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.str_field("code").unwrap_or("-");
        let message = frame.str_field("message").unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
