//! WhatsApp Cloud API client.
//!
//! Outbound sends go through the Graph API `messages` endpoint with the
//! tenant's access token. The two validators back configuration screens and
//! fail closed: any transport problem reads as invalid credentials.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::channels::OutboundChannel;
use crate::error::ChannelError;

const CHANNEL: &str = "whatsapp";

pub struct WhatsAppClient {
    client: Client,
    graph_base_url: String,
}

impl WhatsAppClient {
    pub fn new(graph_base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            graph_base_url: graph_base_url.into(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.graph_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Check that an access token can read its own phone-number object.
    pub async fn validate_channel_token(&self, access_token: &str, phone_number_id: &str) -> bool {
        let url = self.api_url(phone_number_id);
        match self.client.get(&url).bearer_auth(access_token).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Channel token validation request failed: {}", e);
                false
            }
        }
    }

    /// Check app client id/secret by requesting an app access token.
    pub async fn validate_channel_app_credentials(&self, app_id: &str, app_secret: &str) -> bool {
        let url = self.api_url("oauth/access_token");
        match self
            .client
            .get(&url)
            .query(&[
                ("client_id", app_id),
                ("client_secret", app_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("App credential validation request failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl OutboundChannel for WhatsAppClient {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send_text(
        &self,
        access_token: &str,
        phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        let url = self.api_url(&format!("{phone_number_id}/messages"));

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        Ok(())
    }
}
