//! PostgreSQL store backend.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::availability::AvailabilityConfig;
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::llm::ReplyLanguage;
use crate::reservation::{
    NewReservation, Reservation, ReservationDetails, ReservationPatch, ReservationStatus,
};
use crate::store::{Store, Tenant, TenantStatus, WhatsAppCredentials};

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Postgres-backed store.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Connect to the database and verify the pool with one checkout.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    /// Run embedded migrations on a dedicated connection.
    pub async fn run_migrations(config: &DatabaseConfig) -> Result<(), StoreError> {
        let (mut client, connection) = tokio_postgres::connect(config.url(), NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Migration connection error: {}", e);
            }
        });

        embedded::migrations::runner()
            .run_async(&mut client)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        Ok(self.pool.get().await?)
    }
}

const TENANT_COLUMNS: &str = "id, name, owner_id, status, running, expires_at, ai_key, \
     wa_access_token, wa_phone_number_id, wa_business_id, wa_app_id, wa_app_secret, \
     max_seats_per_day, open_time, close_time, open_weekdays, reply_language";

fn tenant_from_row(row: &Row) -> Tenant {
    let status: String = row.get("status");
    let weekdays: serde_json::Value = row.get("open_weekdays");
    let language: String = row.get("reply_language");

    Tenant {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        status: if status == "suspended" {
            TenantStatus::Suspended
        } else {
            TenantStatus::Active
        },
        running: row.get("running"),
        expires_at: row.get("expires_at"),
        ai_key: row.get("ai_key"),
        whatsapp: WhatsAppCredentials {
            access_token: row.get("wa_access_token"),
            phone_number_id: row.get("wa_phone_number_id"),
            business_id: row.get("wa_business_id"),
            app_id: row.get("wa_app_id"),
            app_secret: row.get("wa_app_secret"),
        },
        availability: AvailabilityConfig {
            max_seats_per_day: row.get("max_seats_per_day"),
            open_time: row.get("open_time"),
            close_time: row.get("close_time"),
            open_weekdays: serde_json::from_value(weekdays).unwrap_or_default(),
        },
        reply_language: ReplyLanguage::parse(&language),
    }
}

const RESERVATION_COLUMNS: &str = "id, tenant_id, phone, customer_name, date, time, party_size, \
     status, source, transcript, details, staff_notes, created_at, updated_at";

fn reservation_from_row(row: &Row) -> Reservation {
    let status: String = row.get("status");
    let details: serde_json::Value = row.get("details");

    Reservation {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        phone: row.get("phone"),
        customer_name: row.get("customer_name"),
        date: row.get("date"),
        time: row.get("time"),
        party_size: row.get("party_size"),
        status: ReservationStatus::parse(&status).unwrap_or(ReservationStatus::Pending),
        source: row.get("source"),
        transcript: row.get("transcript"),
        details: serde_json::from_value(details).unwrap_or_default(),
        staff_notes: row.get("staff_notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn tenants_by_channel_phone_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Vec<Tenant>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE wa_phone_number_id = $1"),
                &[&phone_number_id],
            )
            .await?;
        Ok(rows.iter().map(tenant_from_row).collect())
    }

    async fn tenants_with_channel_configured(&self) -> Result<Vec<Tenant>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {TENANT_COLUMNS} FROM tenants \
                     WHERE wa_access_token IS NOT NULL AND wa_access_token <> ''"
                ),
                &[],
            )
            .await?;
        Ok(rows.iter().map(tenant_from_row).collect())
    }

    async fn find_open_reservation(
        &self,
        tenant_id: Uuid,
        phone: &str,
        ttl: Duration,
    ) -> Result<Option<Reservation>, StoreError> {
        let cutoff = Utc::now() - ttl;
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {RESERVATION_COLUMNS} FROM reservations \
                     WHERE tenant_id = $1 AND phone = $2 AND status = 'pending' \
                       AND updated_at >= $3 \
                     ORDER BY updated_at DESC LIMIT 1"
                ),
                &[&tenant_id, &phone, &cutoff],
            )
            .await?;
        Ok(row.as_ref().map(reservation_from_row))
    }

    async fn reservations_for_date(
        &self,
        tenant_id: Uuid,
        date: &str,
    ) -> Result<Vec<Reservation>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {RESERVATION_COLUMNS} FROM reservations \
                     WHERE tenant_id = $1 AND date = $2 AND status <> 'cancelled'"
                ),
                &[&tenant_id, &date],
            )
            .await?;
        Ok(rows.iter().map(reservation_from_row).collect())
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let conn = self.conn().await?;
        let id = Uuid::new_v4();
        let details = serde_json::to_value(&new.details).unwrap_or_default();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO reservations \
                     (id, tenant_id, phone, customer_name, date, time, party_size, status, \
                      source, transcript, details) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                     RETURNING {RESERVATION_COLUMNS}"
                ),
                &[
                    &id,
                    &new.tenant_id,
                    &new.phone,
                    &new.customer_name,
                    &new.date,
                    &new.time,
                    &new.party_size,
                    &new.status.as_str(),
                    &new.source,
                    &new.transcript,
                    &details,
                ],
            )
            .await?;

        Ok(reservation_from_row(&row))
    }

    async fn update_reservation(
        &self,
        id: Uuid,
        patch: ReservationPatch,
    ) -> Result<(), StoreError> {
        let conn = self.conn().await?;
        let details: Option<serde_json::Value> = patch
            .details
            .as_ref()
            .map(|d| serde_json::to_value(d).unwrap_or_default());

        let updated = conn
            .execute(
                "UPDATE reservations SET \
                   customer_name = COALESCE($2, customer_name), \
                   date = COALESCE($3, date), \
                   time = COALESCE($4, time), \
                   party_size = COALESCE($5, party_size), \
                   transcript = COALESCE($6, transcript), \
                   details = COALESCE($7, details), \
                   updated_at = now() \
                 WHERE id = $1",
                &[
                    &id,
                    &patch.customer_name,
                    &patch.date,
                    &patch.time,
                    &patch.party_size,
                    &patch.transcript,
                    &details,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("reservation {id}")));
        }
        Ok(())
    }
}

// ReservationDetails is serialized into the `details` jsonb column; keep a
// serialize impl check close to the mapping code.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_round_trip_json() {
        let details = ReservationDetails {
            occasion: Some("birthday".to_string()),
            seating: None,
            allergies: Some("nuts".to_string()),
            notes: None,
        };
        let value = serde_json::to_value(&details).unwrap();
        let back: ReservationDetails = serde_json::from_value(value).unwrap();
        assert_eq!(back, details);
    }
}
