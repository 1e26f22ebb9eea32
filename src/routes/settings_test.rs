use crate::routes::tests::spawn_app;
use crate::state::test_helpers;

fn url(addr: std::net::SocketAddr) -> String {
    format!("http://{addr}/api/settings/doctor-image")
}

#[tokio::test]
async fn updating_the_image_needs_the_doctor() {
    let addr = spawn_app(test_helpers::test_app_state()).await;
    let response = reqwest::Client::new()
        .put(url(addr))
        .json(&serde_json::json!({ "image": "data:image/png;base64,AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reading_the_image_is_public() {
    // No session: the request reaches the store, which the test pool cannot serve.
    let addr = spawn_app(test_helpers::test_app_state()).await;
    let response = reqwest::get(url(addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "E_DATABASE");
    assert_eq!(body["retryable"], true);
}
