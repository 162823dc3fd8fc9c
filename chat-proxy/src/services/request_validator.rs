//! Shape and size checks for caller-supplied conversations.

use serde_json::Value;
use thiserror::Error;

use crate::models::{Conversation, Message, Role};
use crate::services::redaction;

pub const DEFAULT_MAX_MESSAGES: usize = 10;
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestValidator {
    max_messages: usize,
    max_message_length: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_MAX_MESSAGE_LENGTH)
    }
}

impl RequestValidator {
    pub fn new(max_messages: usize, max_message_length: usize) -> Self {
        Self {
            max_messages,
            max_message_length,
        }
    }

    /// Validate `raw_messages` and return a redacted, trimmed copy.
    ///
    /// Length limits count characters of the content as received, before
    /// redaction or trimming.
    pub fn validate(&self, raw_messages: Option<&Value>) -> Result<Conversation, ValidationError> {
        let items = match raw_messages {
            None | Some(Value::Null) => {
                return Err(ValidationError::new("messages is required"));
            }
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ValidationError::new("messages must be an array")),
        };

        if items.is_empty() {
            return Err(ValidationError::new("messages must not be empty"));
        }
        if items.len() > self.max_messages {
            return Err(ValidationError::new(format!(
                "Too many messages: at most {} allowed",
                self.max_messages
            )));
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.validate_message(index, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Conversation::from_validated)
    }

    fn validate_message(&self, index: usize, item: &Value) -> Result<Message, ValidationError> {
        let (role, content) = match (item.get("role"), item.get("content")) {
            (Some(role), Some(content)) => (role, content),
            _ => {
                return Err(ValidationError::new(format!(
                    "messages[{index}] must have role and content"
                )));
            }
        };

        let role = role.as_str().and_then(Role::parse).ok_or_else(|| {
            ValidationError::new(format!(
                "messages[{index}].role must be one of system, user, assistant"
            ))
        })?;

        let content = content.as_str().ok_or_else(|| {
            ValidationError::new(format!("messages[{index}].content must be a string"))
        })?;

        if content.chars().count() > self.max_message_length {
            return Err(ValidationError::new(format!(
                "messages[{index}].content exceeds {} characters",
                self.max_message_length
            )));
        }

        if content.trim().is_empty() {
            return Err(ValidationError::new(format!(
                "messages[{index}].content must not be empty"
            )));
        }

        Ok(Message::new(role, redaction::redact(content).trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(value: Value) -> Result<Conversation, ValidationError> {
        RequestValidator::default().validate(Some(&value))
    }

    #[test]
    fn test_preserves_length_and_role_sequence() {
        let conversation = validate(json!([
            {"role": "user", "content": "  I have a cough  "},
            {"role": "assistant", "content": "How long?"},
            {"role": "user", "content": "Three days"}
        ]))
        .unwrap();

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(conversation.messages()[0].content, "I have a cough");
        assert_eq!(conversation.messages()[2].content, "Three days");
    }

    #[test]
    fn test_redacts_content_of_every_role() {
        let conversation = validate(json!([
            {"role": "system", "content": "ssn 123-45-6789"},
            {"role": "user", "content": "mrn 12345678901 mail me at a.b@c.de"}
        ]))
        .unwrap();

        assert_eq!(conversation.messages()[0].content, "ssn [REDACTED-SSN]");
        assert_eq!(
            conversation.messages()[1].content,
            "mrn [REDACTED-ID] mail me at [REDACTED-EMAIL]"
        );
    }

    #[test]
    fn test_rejects_missing_or_non_array() {
        let validator = RequestValidator::default();
        assert!(validator.validate(None).is_err());
        assert!(validator.validate(Some(&Value::Null)).is_err());
        assert!(validate(json!("hello")).is_err());
        assert!(validate(json!({"role": "user", "content": "hi"})).is_err());
    }

    #[test]
    fn test_rejects_empty_list() {
        let err = validate(json!([])).unwrap_err();
        assert_eq!(err.reason, "messages must not be empty");
    }

    #[test]
    fn test_rejects_eleven_messages() {
        let messages: Vec<Value> = (0..11)
            .map(|i| json!({"role": "user", "content": format!("message {i}")}))
            .collect();
        assert!(validate(Value::Array(messages)).is_err());

        let messages: Vec<Value> = (0..10)
            .map(|i| json!({"role": "user", "content": format!("message {i}")}))
            .collect();
        assert_eq!(validate(Value::Array(messages)).unwrap().len(), 10);
    }

    #[test]
    fn test_rejects_unknown_role() {
        let err = validate(json!([{"role": "moderator", "content": "hi"}])).unwrap_err();
        assert!(err.reason.contains("role"));
    }

    #[test]
    fn test_rejects_missing_fields() {
        assert!(validate(json!([{"content": "hi"}])).is_err());
        assert!(validate(json!([{"role": "user"}])).is_err());
        assert!(validate(json!([42])).is_err());
    }

    #[test]
    fn test_rejects_non_string_content() {
        assert!(validate(json!([{"role": "user", "content": 42}])).is_err());
        assert!(validate(json!([{"role": "user", "content": ["a"]}])).is_err());
    }

    #[test]
    fn test_content_length_boundary() {
        let at_limit = "a".repeat(4000);
        assert!(validate(json!([{"role": "user", "content": at_limit}])).is_ok());

        let over_limit = "a".repeat(4001);
        let err = validate(json!([{"role": "user", "content": over_limit}])).unwrap_err();
        assert!(err.reason.contains("4000"));
    }

    #[test]
    fn test_rejects_blank_content() {
        assert!(validate(json!([{"role": "user", "content": "   \n"}])).is_err());
    }

    #[test]
    fn test_custom_limits() {
        let validator = RequestValidator::new(2, 5);
        let too_long = json!([{"role": "user", "content": "abcdef"}]);
        assert!(validator.validate(Some(&too_long)).is_err());

        let too_many = json!([
            {"role": "user", "content": "a"},
            {"role": "user", "content": "b"},
            {"role": "user", "content": "c"}
        ]);
        assert!(validator.validate(Some(&too_many)).is_err());
    }

    #[test]
    fn test_is_deterministic() {
        let input = json!([{"role": "user", "content": "call 5551234567 or x@y.com"}]);
        assert_eq!(validate(input.clone()).unwrap(), validate(input).unwrap());
    }
}
