//! Chat completion provider abstractions and implementations.
//!
//! The handler only depends on [`CompletionProvider`], so the hosted endpoint
//! can be swapped for the mock in tests.

pub mod azure_openai;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CompletionParams, Message, TokenUsage};

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Content filtered by upstream")]
    ContentFiltered,

    #[error("Malformed upstream response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result of a completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("stop") | None => FinishReason::Complete,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Whether the credentials and endpoint needed for a call are present.
    fn is_configured(&self) -> bool;

    /// Send the finalized message list upstream.
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
        correlation_id: &str,
    ) -> Result<Completion, ProviderError>;
}
