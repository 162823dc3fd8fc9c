use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chronologically ordered messages that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub(crate) fn from_validated(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message list sent upstream: the fixed system prompt followed by
    /// the conversation in its original order.
    pub fn with_system_prompt(self, system_prompt: &str) -> Vec<Message> {
        let mut finalized = Vec::with_capacity(self.messages.len() + 1);
        finalized.push(Message::new(Role::System, system_prompt));
        finalized.extend(self.messages);
        finalized
    }
}

/// Inbound body of `POST /api/chat`. `messages` stays untyped so shape errors
/// surface as validation reasons instead of JSON decoding failures.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
    #[serde(default)]
    pub max_tokens: Option<serde_json::Value>,
    #[serde(default)]
    pub temperature: Option<serde_json::Value>,
}

pub const MIN_TEMPERATURE: f32 = 0.1;
pub const MAX_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sampling parameters after clamping to the service's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionParams {
    /// Clamp caller-supplied values. Missing or non-numeric values fall back
    /// to the ceiling for `max_tokens` and [`DEFAULT_TEMPERATURE`].
    pub fn clamped(
        max_tokens: Option<&serde_json::Value>,
        temperature: Option<&serde_json::Value>,
        max_tokens_ceiling: u32,
    ) -> Self {
        let ceiling = max_tokens_ceiling.max(1);

        let max_tokens = max_tokens
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
            .map(|v| v.floor().clamp(1.0, ceiling as f64) as u32)
            .unwrap_or(ceiling);

        let temperature = temperature
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
            .map(|v| (v as f32).clamp(MIN_TEMPERATURE, MAX_TEMPERATURE))
            .unwrap_or(DEFAULT_TEMPERATURE);

        Self {
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub usage: TokenUsage,
    pub correlation_id: String,
}
