use super::*;
use crate::state::test_helpers;
use time::macros::date;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

// =============================================================================
// Topic parsing
// =============================================================================

#[test]
fn topic_parse_fixed_names() {
    assert_eq!(Topic::parse("orders"), Some(Topic::Orders));
    assert_eq!(Topic::parse("inventory"), Some(Topic::Inventory));
    assert_eq!(Topic::parse("holidays"), Some(Topic::Holidays));
    assert_eq!(Topic::parse("staff"), Some(Topic::Staff));
    assert_eq!(Topic::parse("chats"), Some(Topic::Chats));
}

#[test]
fn topic_parse_parameterized() {
    assert_eq!(
        Topic::parse("appointments:2026-10-18"),
        Some(Topic::Appointments(date!(2026 - 10 - 18)))
    );
    assert_eq!(Topic::parse("chat:0771234567"), Some(Topic::Chat("0771234567".into())));
}

#[test]
fn topic_parse_rejects_unknown() {
    assert_eq!(Topic::parse("boards"), None);
    assert_eq!(Topic::parse("appointments:tomorrow"), None);
    assert_eq!(Topic::parse("chat:"), None);
    assert_eq!(Topic::parse("medicine:1"), None);
}

#[test]
fn topic_display_round_trips() {
    for raw in ["orders", "chats", "appointments:2026-01-05", "chat:0711111111"] {
        let topic = Topic::parse(raw).expect("topic");
        assert_eq!(topic.to_string(), raw);
    }
}

#[test]
fn public_topics() {
    assert!(Topic::Chat("0771234567".into()).is_public());
    assert!(Topic::Appointments(date!(2026 - 10 - 18)).is_public());
    assert!(!Topic::Holidays.is_public());
    assert!(!Topic::Orders.is_public());
    assert!(!Topic::Chats.is_public());
    assert!(!Topic::Staff.is_public());
}

// =============================================================================
// Publish / subscribe
// =============================================================================

#[tokio::test]
async fn publish_reaches_subscribers_except_excluded() {
    let state = test_helpers::test_app_state();
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);

    subscribe(&state, &Topic::Orders, client_a, tx_a).await;
    subscribe(&state, &Topic::Orders, client_b, tx_b).await;

    let frame = Frame::request("orders:changed", Data::new());
    publish(&state, &Topic::Orders, &frame, Some(client_b)).await;

    let got = assert_channel_has_frame(&mut rx_a).await;
    assert_eq!(got.syscall, "orders:changed");
    assert_eq!(got.topic.as_deref(), Some("orders"));
    assert_channel_empty(&mut rx_b).await;
}

#[tokio::test]
async fn publish_only_hits_matching_topic() {
    let state = test_helpers::test_app_state();
    let client = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(8);
    subscribe(&state, &Topic::Chat("0771111111".into()), client, tx).await;

    notify(&state, &Topic::Chat("0772222222".into()), "chat:message", Data::new()).await;
    assert_channel_empty(&mut rx).await;

    notify(&state, &Topic::Chat("0771111111".into()), "chat:message", Data::new()).await;
    let got = assert_channel_has_frame(&mut rx).await;
    assert_eq!(got.topic.as_deref(), Some("chat:0771111111"));
}

#[tokio::test]
async fn unsubscribe_evicts_empty_topic() {
    let state = test_helpers::test_app_state();
    let client = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);

    subscribe(&state, &Topic::Inventory, client, tx).await;
    assert_eq!(subscriber_count(&state, &Topic::Inventory).await, 1);

    unsubscribe(&state, &Topic::Inventory, client).await;
    assert_eq!(subscriber_count(&state, &Topic::Inventory).await, 0);
    assert!(state.topics.read().await.is_empty());
}

#[tokio::test]
async fn unsubscribe_all_clears_every_topic_for_client() {
    let state = test_helpers::test_app_state();
    let leaving = Uuid::new_v4();
    let staying = Uuid::new_v4();
    let (tx_leaving, _rx_leaving) = mpsc::channel(8);
    let (tx_staying, _rx_staying) = mpsc::channel(8);

    subscribe(&state, &Topic::Orders, leaving, tx_leaving.clone()).await;
    subscribe(&state, &Topic::Inventory, leaving, tx_leaving).await;
    subscribe(&state, &Topic::Orders, staying, tx_staying).await;

    unsubscribe_all(&state, leaving).await;

    assert_eq!(subscriber_count(&state, &Topic::Orders).await, 1);
    assert_eq!(subscriber_count(&state, &Topic::Inventory).await, 0);
}

#[tokio::test]
async fn full_channel_does_not_block_other_subscribers() {
    let state = test_helpers::test_app_state();
    let slow = Uuid::new_v4();
    let fast = Uuid::new_v4();
    let (tx_slow, _rx_slow) = mpsc::channel(1);
    let (tx_fast, mut rx_fast) = mpsc::channel(8);

    subscribe(&state, &Topic::Orders, slow, tx_slow).await;
    subscribe(&state, &Topic::Orders, fast, tx_fast).await;

    for _ in 0..3 {
        notify(&state, &Topic::Orders, "orders:changed", Data::new()).await;
    }

    for _ in 0..3 {
        assert_channel_has_frame(&mut rx_fast).await;
    }
}
