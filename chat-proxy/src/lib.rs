//! HTTP proxy in front of a hosted chat-completion model.
//!
//! Each `POST /api/chat` passes through CORS resolution, a per-client
//! fixed-window rate limit and message validation with best-effort redaction
//! before the conversation, prefixed with a fixed system prompt, is sent
//! upstream.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
