//! Integration tests that run the real server on a random port.
//! Run with: cargo test -p chat-proxy --test health_check

mod common;

use chat_proxy::services::providers::mock::MockCompletionProvider;
use chat_proxy::startup::Application;
use common::test_config;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Spawn the application on a random port and return the port number.
async fn spawn_app(provider: MockCompletionProvider) -> u16 {
    let app = Application::build_with_provider(test_config(), Arc::new(provider), None)
        .await
        .expect("Failed to build application");

    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    port
}

#[tokio::test]
async fn health_check_returns_ok() {
    let port = spawn_app(MockCompletionProvider::new()).await;
    let client = Client::new();

    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "chat-proxy");
    assert_eq!(body["providerConfigured"], true);
}

#[tokio::test]
async fn health_check_reports_unconfigured_provider() {
    let port = spawn_app(MockCompletionProvider::unconfigured()).await;

    let body: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["providerConfigured"], false);
}

#[tokio::test]
async fn metrics_endpoint_is_404_without_recorder() {
    let port = spawn_app(MockCompletionProvider::new()).await;

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_round_trip_over_http() {
    let port = spawn_app(MockCompletionProvider::new()).await;

    let response = Client::new()
        .post(format!("http://127.0.0.1:{}/api/chat", port))
        .header("X-Session-Id", "session-abc")
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hello"}],
            "maxTokens": 50,
            "temperature": 0.2
        }))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["reply"], "Mock response for: hello");
}
