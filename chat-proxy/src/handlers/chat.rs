use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use service_core::error::{AppError, CorrelatedError};
use service_core::middleware::tracing::CorrelationId;

use crate::models::{ChatRequest, ChatResponse};
use crate::startup::AppState;

/// `POST /api/chat`
///
/// CORS and rate limiting run as middleware before this handler.
pub async fn chat(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatResponse>, CorrelatedError> {
    let body = body.map_err(|rejection| {
        tracing::debug!(correlation_id = %correlation_id, error = %rejection, "Unreadable chat body");
        let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::ValidationError("Request body could not be read".to_string())
        };
        error.correlate(&correlation_id)
    })?;

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(correlation_id = %correlation_id, error = %e, "Unparseable chat body");
        AppError::ValidationError("Request body must be a JSON object".to_string())
            .correlate(&correlation_id)
    })?;

    state
        .chat
        .respond(request, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| e.correlate(&correlation_id))
}
