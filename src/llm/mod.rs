//! LLM integration.
//!
//! The completion client prepends the reservation-assistant system prompt,
//! resolves which API key to use (tenant key, then configured default), and
//! talks to an OpenAI-compatible chat completions endpoint that may answer
//! with plain text or a tool-call request.

mod client;
mod openai;
pub mod prompt;
mod provider;

pub use client::{CompletionClient, NO_KEY_REPLY};
pub use openai::OpenAiChatProvider;
pub use prompt::ReplyLanguage;
pub use provider::{
    ChatMessage, CompletionOutcome, CompletionProvider, CompletionRequest, ToolCallRequest,
    ToolDefinition,
};
