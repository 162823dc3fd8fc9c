pub mod chat;
pub mod providers;
pub mod redaction;
pub mod request_validator;

pub use chat::ChatService;
pub use request_validator::{RequestValidator, ValidationError};
