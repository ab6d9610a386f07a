//! Completion client facade.
//!
//! Wraps a [`CompletionProvider`] with the key-resolution policy: prefer the
//! tenant's own key, fall back to the configured default, and with neither
//! present return a fixed user-facing apology instead of erroring — a tenant
//! without a key is a configuration gap, not a crash.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;

use crate::error::LlmError;
use crate::llm::prompt::{self, ReplyLanguage};
use crate::llm::provider::{
    ChatMessage, CompletionOutcome, CompletionProvider, CompletionRequest, ToolDefinition,
};
use crate::transcript::Turn;

/// Reply sent when no provider key is configured at all.
pub const NO_KEY_REPLY: &str = "Lo sentimos, el asistente no está disponible en este momento. / \
     Sorry, the assistant is not available right now.";

/// High-level completion client used by the orchestrator.
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    default_key: Option<SecretString>,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, default_key: Option<SecretString>) -> Self {
        Self {
            provider,
            default_key,
        }
    }

    /// Run one completion round over the conversation so far.
    ///
    /// Network and provider failures propagate; the caller decides what the
    /// customer sees in that case.
    pub async fn complete(
        &self,
        tenant_key: Option<&str>,
        history: &[Turn],
        tools: Vec<ToolDefinition>,
        language: ReplyLanguage,
    ) -> Result<CompletionOutcome, LlmError> {
        let key = match self.resolve_key(tenant_key) {
            Some(key) => key,
            None => {
                tracing::warn!("No provider key available, returning fixed apology");
                return Ok(CompletionOutcome::Text(NO_KEY_REPLY.to_string()));
            }
        };

        let mut messages =
            vec![ChatMessage::system(prompt::build_system_prompt(language, Utc::now()))];
        messages.extend(history.iter().map(ChatMessage::from));

        let request = CompletionRequest {
            messages,
            tools,
            temperature: Some(0.4),
            max_tokens: None,
        };

        self.provider.complete(&key, request).await
    }

    fn resolve_key(&self, tenant_key: Option<&str>) -> Option<SecretString> {
        match tenant_key {
            Some(key) if !key.trim().is_empty() => Some(SecretString::from(key.to_string())),
            _ => self.default_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticProvider;

    #[async_trait]
    impl CompletionProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn complete(
            &self,
            _api_key: &SecretString,
            request: CompletionRequest,
        ) -> Result<CompletionOutcome, LlmError> {
            // Echo back how many messages arrived so tests can assert on it.
            Ok(CompletionOutcome::Text(format!(
                "messages={}",
                request.messages.len()
            )))
        }
    }

    #[tokio::test]
    async fn test_no_key_returns_fixed_apology() {
        let client = CompletionClient::new(Arc::new(StaticProvider), None);
        let outcome = client
            .complete(None, &[Turn::user("hi")], vec![], ReplyLanguage::Both)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Text(NO_KEY_REPLY.to_string()));
    }

    #[tokio::test]
    async fn test_blank_tenant_key_falls_back_to_default() {
        let client = CompletionClient::new(
            Arc::new(StaticProvider),
            Some(SecretString::from("default-key")),
        );
        let outcome = client
            .complete(Some("  "), &[Turn::user("hi")], vec![], ReplyLanguage::Both)
            .await
            .unwrap();
        // System prompt + one history turn.
        assert_eq!(outcome, CompletionOutcome::Text("messages=2".to_string()));
    }

    #[tokio::test]
    async fn test_tenant_key_used_when_present() {
        let client = CompletionClient::new(Arc::new(StaticProvider), None);
        let outcome = client
            .complete(
                Some("tenant-key"),
                &[Turn::user("hi"), Turn::assistant("hello")],
                vec![],
                ReplyLanguage::Es,
            )
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Text("messages=3".to_string()));
    }
}
