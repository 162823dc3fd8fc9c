//! HTTP handlers for the chat proxy.

pub mod chat;
pub mod fallback;
pub mod health;
pub mod metrics;
