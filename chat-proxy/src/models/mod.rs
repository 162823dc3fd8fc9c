//! Domain models for the chat proxy.

pub mod chat;

pub use chat::{
    ChatRequest, ChatResponse, CompletionParams, Conversation, Message, Role, TokenUsage,
};
