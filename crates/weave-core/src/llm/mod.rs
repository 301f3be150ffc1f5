//! LLM integration
//!
//! This module provides:
//! - The [`CompletionService`] trait the extractor depends on
//! - An OpenAI-compatible HTTP client implementing it
//! - Request/response wire types

mod client;
mod completion;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use completion::CompletionService;
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole, Usage,
};
