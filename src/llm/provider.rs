//! Provider-agnostic completion types.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::transcript::{Role, Turn};

/// A message in the provider's chat format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// A function the model may call, declared in JSON Schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A single completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// What the provider answered: plain text, or a request to run a tool.
///
/// Callers must match on the variant; a tool call may still carry partial
/// assistant text alongside it.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Text(String),
    ToolCall {
        call: ToolCallRequest,
        content: Option<String>,
    },
}

impl CompletionOutcome {
    /// Force the outcome into user-facing text.
    ///
    /// Used when the tool hop budget is spent: a further tool-call-shaped
    /// response is surfaced as whatever text it carried, falling back to a
    /// rendering of the call itself so the turn always ends in a message.
    pub fn coerce_text(self) -> String {
        match self {
            CompletionOutcome::Text(text) => text,
            CompletionOutcome::ToolCall { call, content } => match content {
                Some(text) if !text.trim().is_empty() => text,
                _ => format!("{} {}", call.name, call.arguments),
            },
        }
    }
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Run one completion round with the given API key.
    async fn complete(
        &self,
        api_key: &SecretString,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, LlmError>;
}
