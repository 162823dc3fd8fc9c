//! Mock provider implementation for testing.

use super::{Completion, CompletionProvider, FinishReason, ProviderError};
use crate::models::{CompletionParams, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::Mutex;

/// A call captured by [`MockCompletionProvider`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub params: CompletionParams,
    pub correlation_id: String,
}

/// Echoes the last message back and records every call.
pub struct MockCompletionProvider {
    configured: bool,
    fail_with_status: Option<u16>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            configured: true,
            fail_with_status: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Every call fails as if upstream answered with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
        correlation_id: &str,
    ) -> Result<Completion, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                params: *params,
                correlation_id: correlation_id.to_string(),
            });
        }

        if !self.configured {
            return Err(ProviderError::NotConfigured(
                "Mock provider not configured".to_string(),
            ));
        }

        if let Some(status) = self.fail_with_status {
            return Err(ProviderError::ApiError {
                status,
                body: "mock failure".to_string(),
            });
        }

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let prompt_tokens: u32 = messages.iter().map(|m| m.content.len() as u32 / 4).sum();

        Ok(Completion {
            content: format!("Mock response for: {}", last),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens: 10,
                total_tokens: prompt_tokens + 10,
            },
            finish_reason: FinishReason::Complete,
        })
    }
}
