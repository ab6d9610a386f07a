//! OpenAI-compatible Chat Completions API provider.
//!
//! Speaks the standard `/v1/chat/completions` wire format with bearer-key
//! auth. The key is supplied per request because each tenant may bring its
//! own; the HTTP client is shared.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionOutcome, CompletionProvider, CompletionRequest, ToolCallRequest,
};
use crate::transcript::Role;

const PROVIDER: &str = "openai_chat";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiChatProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiChatProvider {
    pub fn new(config: &LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_request(
        &self,
        api_key: &SecretString,
        body: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let url = self.api_url("chat/completions");

        tracing::debug!(model = %body.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            if status.as_u16() == 401 {
                return Err(LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                });
            }
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after: None,
                });
            }
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {response_text}"),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("JSON parse error: {e}"),
        })
    }

    /// Check whether an API key is usable. Fails closed: any transport or
    /// auth problem reads as invalid.
    pub async fn validate_provider_key(&self, api_key: &SecretString) -> bool {
        let url = self.api_url("models");

        match self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Provider key validation request failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChatProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        api_key: &SecretString,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, LlmError> {
        let messages: Vec<WireMessage> = request.messages.iter().map(WireMessage::from).collect();

        let tools: Vec<WireTool> = request
            .tools
            .into_iter()
            .map(|t| WireTool {
                tool_type: "function".to_string(),
                function: WireFunction {
                    name: t.name,
                    description: Some(t.description),
                    parameters: Some(t.parameters),
                },
            })
            .collect();

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response = self.send_request(api_key, &body).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "No choices in response".to_string(),
            })?;

        let message = choice.message.ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "Choice without message".to_string(),
        })?;

        let tool_calls = message.tool_calls.unwrap_or_default();

        if let Some(tc) = tool_calls.into_iter().next() {
            // Arguments arrive as a JSON-encoded string; a malformed blob
            // degrades to an empty object rather than failing the turn.
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::Object(Default::default()));
            return Ok(CompletionOutcome::ToolCall {
                call: ToolCallRequest {
                    name: tc.function.name,
                    arguments,
                },
                content: message.content.filter(|c| !c.trim().is_empty()),
            });
        }

        Ok(CompletionOutcome::Text(message.content.unwrap_or_default()))
    }
}

// Wire types for the chat completions API.

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireResponseMessage>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[allow(dead_code)]
    id: Option<String>,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let msg = ChatMessage::user("Hello");
        let wire = WireMessage::from(&msg);
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "Hello");
    }

    #[test]
    fn test_response_with_tool_call_deserializes() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "check_availability",
                            "arguments": "{\"date\":\"2025-01-03\",\"time\":\"19:00\",\"partySize\":2}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let calls = parsed.choices[0]
            .message
            .as_ref()
            .unwrap()
            .tool_calls
            .as_ref()
            .unwrap();
        assert_eq!(calls[0].function.name, "check_availability");
    }

    #[test]
    fn test_tools_omitted_when_empty() {
        let body = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![],
            temperature: None,
            max_tokens: None,
            tools: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("tools"));
    }
}
