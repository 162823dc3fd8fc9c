//! Azure OpenAI chat completions provider.
//!
//! Calls `{endpoint}/openai/deployments/{deployment}/chat/completions` with the
//! configured `api-version`, authenticating with the `api-key` header.

use super::{Completion, CompletionProvider, FinishReason, ProviderError};
use crate::config::AzureOpenAiConfig;
use crate::models::{CompletionParams, Message, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::outbound_trace_headers;
use std::time::Duration;

pub struct AzureOpenAiProvider {
    config: AzureOpenAiConfig,
    client: Client,
}

impl AzureOpenAiProvider {
    pub fn new(config: AzureOpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the chat completions URL for the configured deployment.
    fn api_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }
}

#[async_trait]
impl CompletionProvider for AzureOpenAiProvider {
    fn is_configured(&self) -> bool {
        !self.config.endpoint.trim().is_empty()
            && !self.config.deployment.trim().is_empty()
            && !self.config.api_key.expose_secret().trim().is_empty()
    }

    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
        correlation_id: &str,
    ) -> Result<Completion, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(
                "Azure OpenAI endpoint, deployment or key missing".to_string(),
            ));
        }

        let request = ChatCompletionRequest {
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        tracing::debug!(
            deployment = %self.config.deployment,
            message_count = messages.len(),
            max_tokens = params.max_tokens,
            "Sending request to Azure OpenAI"
        );

        let response = self
            .client
            .post(self.api_url())
            .headers(outbound_trace_headers(correlation_id))
            .header("api-key", self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices returned".to_string()))?;

        let finish_reason = FinishReason::from_wire(choice.finish_reason.as_deref());
        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        let content = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ProviderError::InvalidResponse("choice has no content".to_string()))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            content,
            usage,
            finish_reason,
        })
    }
}

// Azure OpenAI wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config(endpoint: &str, key: &str) -> AzureOpenAiConfig {
        AzureOpenAiConfig {
            endpoint: endpoint.to_string(),
            api_key: Secret::new(key.to_string()),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-01".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let provider = AzureOpenAiProvider::new(config("https://res.openai.azure.com/", "k")).unwrap();
        assert_eq!(
            provider.api_url(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_is_configured() {
        let provider = AzureOpenAiProvider::new(config("https://res.openai.azure.com", "k")).unwrap();
        assert!(provider.is_configured());

        let provider = AzureOpenAiProvider::new(config("https://res.openai.azure.com", "")).unwrap();
        assert!(!provider.is_configured());

        let provider = AzureOpenAiProvider::new(config("", "k")).unwrap();
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_request_serializes_roles_lowercase() {
        let messages = vec![Message::new(crate::models::Role::System, "be brief")];
        let body = serde_json::to_value(ChatCompletionRequest {
            messages: &messages,
            max_tokens: 10,
            temperature: 0.5,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 10);
    }
}
