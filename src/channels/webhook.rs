//! Inbound WhatsApp webhook routes.
//!
//! Two endpoints: the GET verification handshake Meta performs when the
//! webhook is registered, and the POST delivery endpoint. Deliveries are
//! always acknowledged with 200 — webhook providers retry-storm on error
//! statuses, and a failed turn is not something redelivery can fix.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::orchestrator::{Orchestrator, TurnDisposition};

/// Shared state for the webhook routes.
pub struct WebhookState {
    pub orchestrator: Arc<Orchestrator>,
    pub verify_token: SecretString,
}

/// Route fragment for the WhatsApp webhook, state applied.
pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(verify_handler))
        .route("/webhook/whatsapp", post(delivery_handler))
        .with_state(state)
}

// --- verification handshake ---

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

async fn verify_handler(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    if let (Some(mode), Some(token), Some(challenge)) =
        (&params.mode, &params.verify_token, &params.challenge)
        && mode == "subscribe"
        && token == state.verify_token.expose_secret()
    {
        tracing::info!("Webhook verification handshake accepted");
        return (StatusCode::OK, challenge.clone());
    }

    tracing::warn!("Webhook verification handshake rejected");
    (StatusCode::FORBIDDEN, String::new())
}

// --- message delivery ---

/// Cloud API delivery payload. Only the fields the pipeline reads are
/// declared; everything defaults so status callbacks and unknown shapes
/// deserialize instead of erroring.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<ChannelMetadata>,
    pub messages: Option<Vec<InboundMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelMetadata {
    pub phone_number_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// The fields one turn actually needs.
#[derive(Debug, Clone)]
pub struct InboundText {
    /// Customer phone.
    pub from: String,
    /// Message text.
    pub body: String,
    /// The receiving channel's phone-number id, used for tenant routing.
    pub phone_number_id: String,
}

impl WebhookPayload {
    /// Extract the first text message, if the delivery carries one.
    /// Status callbacks and non-text messages yield `None`.
    pub fn first_text_message(&self) -> Option<InboundText> {
        for entry in &self.entry {
            for change in &entry.changes {
                let Some(messages) = &change.value.messages else {
                    continue;
                };
                let Some(metadata) = &change.value.metadata else {
                    continue;
                };
                for message in messages {
                    if let Some(text) = &message.text {
                        return Some(InboundText {
                            from: message.from.clone(),
                            body: text.body.clone(),
                            phone_number_id: metadata.phone_number_id.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Serialize)]
struct DeliveryAck {
    status: &'static str,
}

async fn delivery_handler(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<DeliveryAck>) {
    let disposition = state.orchestrator.handle_delivery(&payload).await;

    let status = match disposition {
        TurnDisposition::Ignored => "ignored",
        TurnDisposition::NoTenantMatch => "no_tenant",
        TurnDisposition::Replied => "ok",
        TurnDisposition::CompletionFailed => "completion_failed",
    };

    (StatusCode::OK, Json(DeliveryAck { status }))
}
