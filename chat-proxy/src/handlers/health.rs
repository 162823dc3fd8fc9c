use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness probe. Always `200`; also reports whether the completion
/// provider has credentials.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.service_name.as_ref(),
        "version": env!("CARGO_PKG_VERSION"),
        "providerConfigured": state.chat.provider_configured(),
    }))
}
