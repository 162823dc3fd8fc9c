#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use chat_proxy::config::{
    AzureOpenAiConfig, ChatProxyConfig, CorsConfig, LimitsConfig, DEFAULT_SYSTEM_PROMPT,
};
use chat_proxy::services::providers::mock::MockCompletionProvider;
use chat_proxy::startup::{build_router, AppState};
use secrecy::Secret;
use service_core::config::{Config, Environment};
use std::sync::Arc;

pub const ALLOWED_ORIGIN: &str = "https://clinic.example.com";

pub fn test_config() -> ChatProxyConfig {
    ChatProxyConfig {
        common: Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Test,
        service_name: "chat-proxy".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        azure_openai: AzureOpenAiConfig {
            endpoint: String::new(),
            api_key: Secret::new(String::new()),
            deployment: String::new(),
            api_version: "2024-02-01".to_string(),
            timeout_secs: 5,
        },
        limits: LimitsConfig::default(),
        cors: CorsConfig {
            allowed_origins: vec![
                ALLOWED_ORIGIN.to_string(),
                "https://*.preview.example.net".to_string(),
            ],
        },
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
    }
}

pub fn app_with(config: &ChatProxyConfig, provider: Arc<MockCompletionProvider>) -> Router {
    let state = AppState::from_config(config, provider).expect("Failed to build state");
    build_router(state)
}

pub fn app(provider: Arc<MockCompletionProvider>) -> Router {
    app_with(&test_config(), provider)
}

pub fn chat_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("Content-Type", "application/json")
        .header("Origin", ALLOWED_ORIGIN)
        .header("X-Forwarded-For", "198.51.100.10")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
