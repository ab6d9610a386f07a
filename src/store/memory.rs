//! In-process store backend.
//!
//! Mirrors the hosted system's mock persistence mode: everything lives in
//! maps behind an async lock. Also the test double for the orchestrator.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::reservation::{Reservation, ReservationPatch, ReservationStatus};
use crate::store::{NewReservation, Store, Tenant};

#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<Vec<Tenant>>,
    reservations: RwLock<HashMap<Uuid, Reservation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.tenants.write().await.push(tenant);
    }

    /// Fetch a reservation by id (test helper).
    pub async fn reservation(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.read().await.get(&id).cloned()
    }

    /// All reservations for a tenant, unordered (test helper).
    pub async fn reservations_for_tenant(&self, tenant_id: Uuid) -> Vec<Reservation> {
        self.reservations
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn tenants_by_channel_phone_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Vec<Tenant>, StoreError> {
        Ok(self
            .tenants
            .read()
            .await
            .iter()
            .filter(|t| t.whatsapp.phone_number_id.as_deref() == Some(phone_number_id))
            .cloned()
            .collect())
    }

    async fn tenants_with_channel_configured(&self) -> Result<Vec<Tenant>, StoreError> {
        Ok(self
            .tenants
            .read()
            .await
            .iter()
            .filter(|t| {
                t.whatsapp
                    .access_token
                    .as_deref()
                    .is_some_and(|token| !token.is_empty())
            })
            .cloned()
            .collect())
    }

    async fn find_open_reservation(
        &self,
        tenant_id: Uuid,
        phone: &str,
        ttl: Duration,
    ) -> Result<Option<Reservation>, StoreError> {
        let cutoff = Utc::now() - ttl;
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.phone == phone
                    && r.status == ReservationStatus::Pending
                    && r.updated_at >= cutoff
            })
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn reservations_for_date(
        &self,
        tenant_id: Uuid,
        date: &str,
    ) -> Result<Vec<Reservation>, StoreError> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.date == date
                    && r.status != ReservationStatus::Cancelled
            })
            .cloned()
            .collect())
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            phone: new.phone,
            customer_name: new.customer_name,
            date: new.date,
            time: new.time,
            party_size: new.party_size,
            status: new.status,
            source: new.source,
            transcript: new.transcript,
            details: new.details,
            staff_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.reservations
            .write()
            .await
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn update_reservation(
        &self,
        id: Uuid,
        patch: ReservationPatch,
    ) -> Result<(), StoreError> {
        let mut reservations = self.reservations.write().await;
        let reservation = reservations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))?;

        if let Some(name) = patch.customer_name {
            reservation.customer_name = name;
        }
        if let Some(date) = patch.date {
            reservation.date = date;
        }
        if let Some(time) = patch.time {
            reservation.time = time;
        }
        if let Some(party_size) = patch.party_size {
            reservation.party_size = party_size;
        }
        if let Some(transcript) = patch.transcript {
            reservation.transcript = transcript;
        }
        if let Some(details) = patch.details {
            reservation.details = details;
        }
        reservation.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::ReservationDetails;

    fn new_reservation(tenant_id: Uuid, phone: &str) -> NewReservation {
        NewReservation {
            tenant_id,
            phone: phone.to_string(),
            customer_name: "Ana".to_string(),
            date: "2025-03-01".to_string(),
            time: "20:00".to_string(),
            party_size: 2,
            status: ReservationStatus::Pending,
            source: "whatsapp".to_string(),
            transcript: String::new(),
            details: ReservationDetails::default(),
        }
    }

    #[tokio::test]
    async fn test_open_reservation_lookup_matches_pending_only() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let created = store
            .create_reservation(new_reservation(tenant, "+34600"))
            .await
            .unwrap();

        let found = store
            .find_open_reservation(tenant, "+34600", Duration::days(7))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, created.id);

        // A confirmed row must stop matching.
        store
            .reservations
            .write()
            .await
            .get_mut(&created.id)
            .unwrap()
            .status = ReservationStatus::Confirmed;
        let found = store
            .find_open_reservation(tenant, "+34600", Duration::days(7))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_open_reservation_respects_ttl() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let created = store
            .create_reservation(new_reservation(tenant, "+34600"))
            .await
            .unwrap();

        store
            .reservations
            .write()
            .await
            .get_mut(&created.id)
            .unwrap()
            .updated_at = Utc::now() - Duration::days(30);

        let found = store
            .find_open_reservation(tenant, "+34600", Duration::days(7))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_excluded_from_date_snapshot() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let kept = store
            .create_reservation(new_reservation(tenant, "+1"))
            .await
            .unwrap();
        let dropped = store
            .create_reservation(new_reservation(tenant, "+2"))
            .await
            .unwrap();
        store
            .reservations
            .write()
            .await
            .get_mut(&dropped.id)
            .unwrap()
            .status = ReservationStatus::Cancelled;

        let day = store
            .reservations_for_date(tenant, "2025-03-01")
            .await
            .unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_patch_applies_only_set_fields() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let created = store
            .create_reservation(new_reservation(tenant, "+34600"))
            .await
            .unwrap();

        store
            .update_reservation(
                created.id,
                ReservationPatch {
                    party_size: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store.reservation(created.id).await.unwrap();
        assert_eq!(updated.party_size, 4);
        assert_eq!(updated.customer_name, "Ana");
        assert_eq!(updated.date, "2025-03-01");
    }
}
