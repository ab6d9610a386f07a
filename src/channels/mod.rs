//! Messaging channels.
//!
//! Inbound traffic arrives as WhatsApp Cloud API webhook deliveries
//! (`webhook`); outbound replies go through the Graph API (`whatsapp`).
//! The outbound side is a trait so the orchestrator can be exercised
//! without the network.

pub mod webhook;
pub mod webhook_server;
pub mod whatsapp;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Outbound message delivery.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Channel name used in logs.
    fn name(&self) -> &str;

    /// Send one text message from the tenant's channel number to a customer.
    async fn send_text(
        &self,
        access_token: &str,
        phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<(), ChannelError>;
}
