use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::middleware::tracing::CorrelationId;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Too many requests")]
    TooManyRequests(Option<u64>),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Upstream error: {0}")]
    UpstreamError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Wire shape of every rejection.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller. Configuration, upstream and internal
    /// details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(reason) => reason.clone(),
            AppError::TooManyRequests(_) => "Too many requests. Please try again later.".to_string(),
            AppError::PayloadTooLarge => "Request body is too large".to_string(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::NotFound => "Not found".to_string(),
            AppError::ConfigError(_) => "Service configuration error".to_string(),
            AppError::UpstreamError(_) => "The assistant is temporarily unavailable".to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
        }
    }

    /// Attach the request's correlation id so the error can be rendered.
    pub fn correlate(self, correlation_id: &CorrelationId) -> CorrelatedError {
        CorrelatedError {
            correlation_id: correlation_id.clone(),
            error: self,
        }
    }
}

/// An [`AppError`] bound to the request it was raised for.
#[derive(Debug)]
pub struct CorrelatedError {
    pub correlation_id: CorrelationId,
    pub error: AppError,
}

impl IntoResponse for CorrelatedError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!(
                correlation_id = %self.correlation_id,
                status = status.as_u16(),
                error = ?self.error,
                "Request failed"
            );
        } else {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                status = status.as_u16(),
                error = %self.error,
                "Request rejected"
            );
        }

        let retry_after = match &self.error {
            AppError::TooManyRequests(retry) => *retry,
            _ => None,
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error: self.error.public_message(),
                correlation_id: self.correlation_id.to_string(),
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry));
        }

        res
    }
}
