use super::*;

#[tokio::test]
async fn new_state_has_no_topics() {
    let state = test_helpers::test_app_state();
    assert!(state.topics.read().await.is_empty());
    assert!(state.mailer.is_none());
}

#[tokio::test]
async fn clones_share_topic_map() {
    let state = test_helpers::test_app_state();
    let clone = state.clone();
    let (tx, _rx) = mpsc::channel(1);

    clone
        .topics
        .write()
        .await
        .entry("orders".into())
        .or_default()
        .insert(Uuid::new_v4(), tx);

    assert_eq!(state.topics.read().await.len(), 1);
}

#[tokio::test]
async fn now_uses_configured_offset() {
    let config = Config { utc_offset: time::UtcOffset::from_hms(-4, 0, 0).expect("offset"), ..Config::default() };
    let state = test_helpers::test_app_state_with_config(config);
    assert_eq!(state.now().offset().whole_hours(), -4);
}
