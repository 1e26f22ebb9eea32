//! Hub service: topic subscriptions and live-update broadcast.
//!
//! DESIGN
//! ======
//! Every screen that used to hold a live listener (pending orders queue,
//! inventory table, a day's appointment board, a chat thread) maps to a
//! named topic. WebSocket clients subscribe with their per-connection
//! sender; services publish a frame on the topic after their write commits.
//!
//! Publishing is best-effort: a full client channel drops the frame for
//! that client only. Topics with no subscribers are evicted.

use std::collections::HashMap;
use std::fmt;

use time::Date;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::clock;
use crate::frame::{Data, Frame};
use crate::state::AppState;

// =============================================================================
// TOPICS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Pharmacy orders (pending queue and completed sales).
    Orders,
    Inventory,
    Holidays,
    Staff,
    /// Doctor inbox: thread list.
    Chats,
    /// Appointment board for one day.
    Appointments(Date),
    /// A single patient chat thread keyed by phone.
    Chat(String),
}

impl Topic {
    /// Parse the wire form (`orders`, `appointments:2026-10-18`, `chat:077...`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.split_once(':') {
            None => match raw {
                "orders" => Some(Self::Orders),
                "inventory" => Some(Self::Inventory),
                "holidays" => Some(Self::Holidays),
                "staff" => Some(Self::Staff),
                "chats" => Some(Self::Chats),
                _ => None,
            },
            Some(("appointments", date)) => clock::parse_date(date).map(Self::Appointments),
            Some(("chat", phone)) if !phone.trim().is_empty() => Some(Self::Chat(phone.trim().to_owned())),
            Some(_) => None,
        }
    }

    /// Topics an unauthenticated patient socket may follow.
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Appointments(_) | Self::Chat(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orders => f.write_str("orders"),
            Self::Inventory => f.write_str("inventory"),
            Self::Holidays => f.write_str("holidays"),
            Self::Staff => f.write_str("staff"),
            Self::Chats => f.write_str("chats"),
            Self::Appointments(date) => write!(f, "appointments:{}", clock::format_date(*date)),
            Self::Chat(phone) => write!(f, "chat:{phone}"),
        }
    }
}

// =============================================================================
// SUBSCRIBE / UNSUBSCRIBE
// =============================================================================

/// Subscribe a client to a topic. Re-subscribing replaces the sender.
pub async fn subscribe(state: &AppState, topic: &Topic, client_id: Uuid, tx: mpsc::Sender<Frame>) {
    let mut topics = state.topics.write().await;
    let subscribers = topics.entry(topic.to_string()).or_default();
    subscribers.insert(client_id, tx);
    debug!(%topic, %client_id, subscribers = subscribers.len(), "hub: subscribed");
}

/// Remove one client from one topic. Evicts the topic when empty.
pub async fn unsubscribe(state: &AppState, topic: &Topic, client_id: Uuid) {
    let key = topic.to_string();
    let mut topics = state.topics.write().await;
    let Some(subscribers) = topics.get_mut(&key) else {
        return;
    };
    subscribers.remove(&client_id);
    if subscribers.is_empty() {
        topics.remove(&key);
    }
}

/// Remove a client from every topic (connection closed).
pub async fn unsubscribe_all(state: &AppState, client_id: Uuid) {
    let mut topics = state.topics.write().await;
    topics.retain(|_, subscribers| {
        subscribers.remove(&client_id);
        !subscribers.is_empty()
    });
}

/// Number of live subscribers on a topic.
pub async fn subscriber_count(state: &AppState, topic: &Topic) -> usize {
    let topics = state.topics.read().await;
    topics.get(&topic.to_string()).map_or(0, HashMap::len)
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Broadcast a frame to every subscriber of a topic, optionally excluding one.
pub async fn publish(state: &AppState, topic: &Topic, frame: &Frame, exclude: Option<Uuid>) {
    let topics = state.topics.read().await;
    let Some(subscribers) = topics.get(&topic.to_string()) else {
        return;
    };

    let frame = frame.clone().with_topic(topic.to_string());
    for (client_id, tx) in subscribers {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

/// Publish a `<syscall>` change notification with the given payload.
pub async fn notify(state: &AppState, topic: &Topic, syscall: &str, data: Data) {
    let frame = Frame::request(syscall, data);
    publish(state, topic, &frame, None).await;
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
