//! Request pipeline between the HTTP handler and the completion provider.

use metrics::counter;
use service_core::error::AppError;
use service_core::middleware::tracing::CorrelationId;
use std::sync::Arc;

use crate::models::{ChatRequest, ChatResponse, CompletionParams};
use crate::services::providers::{CompletionProvider, ProviderError};
use crate::services::request_validator::RequestValidator;

#[derive(Clone)]
pub struct ChatService {
    validator: RequestValidator,
    provider: Arc<dyn CompletionProvider>,
    system_prompt: Arc<str>,
    max_tokens_ceiling: u32,
}

impl ChatService {
    pub fn new(
        validator: RequestValidator,
        provider: Arc<dyn CompletionProvider>,
        system_prompt: impl Into<Arc<str>>,
        max_tokens_ceiling: u32,
    ) -> Self {
        Self {
            validator,
            provider,
            system_prompt: system_prompt.into(),
            max_tokens_ceiling,
        }
    }

    pub fn provider_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Validate, finalize and forward one chat request.
    pub async fn respond(
        &self,
        request: ChatRequest,
        correlation_id: &CorrelationId,
    ) -> Result<ChatResponse, AppError> {
        if !self.provider.is_configured() {
            counter!("chat_proxy_rejections_total", "reason" => "configuration").increment(1);
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "completion provider is not configured"
            )));
        }

        let conversation = self
            .validator
            .validate(request.messages.as_ref())
            .map_err(|e| {
                counter!("chat_proxy_rejections_total", "reason" => "validation").increment(1);
                AppError::ValidationError(e.reason)
            })?;

        let params = CompletionParams::clamped(
            request.max_tokens.as_ref(),
            request.temperature.as_ref(),
            self.max_tokens_ceiling,
        );
        let message_count = conversation.len();
        let messages = conversation.with_system_prompt(&self.system_prompt);

        tracing::info!(
            correlation_id = %correlation_id,
            message_count,
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            "Forwarding chat request"
        );

        let completion = self
            .provider
            .complete(&messages, &params, correlation_id.as_str())
            .await
            .map_err(|e| {
                let (reason, error) = provider_rejection(e);
                counter!("chat_proxy_rejections_total", "reason" => reason).increment(1);
                error
            })?;

        tracing::info!(
            correlation_id = %correlation_id,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            finish_reason = ?completion.finish_reason,
            "Chat completion succeeded"
        );

        Ok(ChatResponse {
            reply: completion.content,
            usage: completion.usage,
            correlation_id: correlation_id.to_string(),
        })
    }
}

/// Rejection-counter label and caller-facing error for a failed completion.
fn provider_rejection(error: ProviderError) -> (&'static str, AppError) {
    match error {
        ProviderError::NotConfigured(msg) => {
            ("configuration", AppError::ConfigError(anyhow::anyhow!(msg)))
        }
        other => ("upstream", AppError::UpstreamError(anyhow::Error::new(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::providers::mock::MockCompletionProvider;
    use serde_json::json;

    fn request(body: serde_json::Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    fn service(provider: Arc<MockCompletionProvider>) -> ChatService {
        ChatService::new(RequestValidator::default(), provider, "SYSTEM", 1000)
    }

    #[tokio::test]
    async fn test_forwards_system_prompt_and_clamped_params() {
        let provider = Arc::new(MockCompletionProvider::new());
        let id = CorrelationId::from("corr-1");

        let response = service(provider.clone())
            .respond(
                request(json!({
                    "messages": [{"role": "user", "content": "my ssn is 123-45-6789"}],
                    "maxTokens": 99999,
                    "temperature": 0
                })),
                &id,
            )
            .await
            .unwrap();

        assert_eq!(response.correlation_id, "corr-1");
        assert_eq!(response.reply, "Mock response for: my ssn is [REDACTED-SSN]");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages[0].role, Role::System);
        assert_eq!(calls[0].messages[0].content, "SYSTEM");
        assert_eq!(calls[0].params.max_tokens, 1000);
        assert_eq!(calls[0].params.temperature, 0.1);
        assert_eq!(calls[0].correlation_id, "corr-1");
    }

    #[tokio::test]
    async fn test_validation_failure_skips_provider() {
        let provider = Arc::new(MockCompletionProvider::new());
        let err = service(provider.clone())
            .respond(request(json!({"messages": []})), &CorrelationId::from("c"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_config_error() {
        let provider = Arc::new(MockCompletionProvider::unconfigured());
        let err = service(provider)
            .respond(
                request(json!({"messages": [{"role": "user", "content": "hi"}]})),
                &CorrelationId::from("c"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_upstream_error() {
        let provider = Arc::new(MockCompletionProvider::failing(500));
        let err = service(provider)
            .respond(
                request(json!({"messages": [{"role": "user", "content": "hi"}]})),
                &CorrelationId::from("c"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamError(_)));
    }

    #[test]
    fn test_provider_not_configured_counts_as_configuration() {
        let (reason, error) =
            provider_rejection(ProviderError::NotConfigured("missing key".to_string()));
        assert_eq!(reason, "configuration");
        assert!(matches!(error, AppError::ConfigError(_)));

        let (reason, error) = provider_rejection(ProviderError::RateLimited);
        assert_eq!(reason, "upstream");
        assert!(matches!(error, AppError::UpstreamError(_)));
    }
}
