//! Tenant and reservation persistence.
//!
//! The conversation pipeline only needs the narrow interface in [`Store`];
//! which backend implements it is a deployment choice. `postgres` is the
//! production backend, `memory` serves single-node trials and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::availability::AvailabilityConfig;
use crate::error::StoreError;
use crate::llm::ReplyLanguage;
use crate::reservation::{NewReservation, Reservation, ReservationPatch};

/// Whether an operator has suspended the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// WhatsApp Business channel credentials for one tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub business_id: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

/// One restaurant account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Option<Uuid>,
    pub status: TenantStatus,
    /// Operationally powered on. A tenant can be active but stopped.
    pub running: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Tenant-specific completion-provider key.
    pub ai_key: Option<String>,
    pub whatsapp: WhatsAppCredentials,
    pub availability: AvailabilityConfig,
    pub reply_language: ReplyLanguage,
}

impl Tenant {
    /// Running, active, and not past its expiry date.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.running
            && self.status == TenantStatus::Active
            && self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

/// Keyed CRUD the conversation pipeline needs.
#[async_trait]
pub trait Store: Send + Sync {
    /// Tenants whose WhatsApp phone-number id matches the inbound routing id.
    async fn tenants_by_channel_phone_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Vec<Tenant>, StoreError>;

    /// Tenants that have any channel access token configured. Used by the
    /// single-tenant fallback when routing ids are misconfigured.
    async fn tenants_with_channel_configured(&self) -> Result<Vec<Tenant>, StoreError>;

    /// The reservation anchoring this phone's open conversation: the most
    /// recent `pending` row touched within `ttl`. Confirmed and cancelled
    /// rows never match.
    async fn find_open_reservation(
        &self,
        tenant_id: Uuid,
        phone: &str,
        ttl: Duration,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Non-cancelled reservations for one tenant and calendar date.
    async fn reservations_for_date(
        &self,
        tenant_id: Uuid,
        date: &str,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    async fn update_reservation(
        &self,
        id: Uuid,
        patch: ReservationPatch,
    ) -> Result<(), StoreError>;
}
