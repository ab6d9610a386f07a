//! Reservation records and the confirmation-payload merge.
//!
//! A reservation row is the durable artifact of a WhatsApp conversation:
//! created as a placeholder on first contact, enriched turn by turn, and
//! eventually confirmed or cancelled by staff outside this service.

mod extract;

pub use extract::{ReservationPayload, extract};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to a reservation created purely to anchor the transcript
/// before any concrete details are known.
pub const PLACEHOLDER_NAME: &str = "Pending Registration";

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Structured side channel the model fills in alongside the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ReservationDetails {
    /// Key-by-key merge: a new value wins only when present.
    pub fn merged_with(&self, new: &ReservationDetails) -> ReservationDetails {
        fn pick(new: &Option<String>, prior: &Option<String>) -> Option<String> {
            match new {
                Some(v) if !v.trim().is_empty() => Some(v.clone()),
                _ => prior.clone(),
            }
        }
        ReservationDetails {
            occasion: pick(&new.occasion, &self.occasion),
            seating: pick(&new.seating, &self.seating),
            allergies: pick(&new.allergies, &self.allergies),
            notes: pick(&new.notes, &self.notes),
        }
    }
}

/// A stored reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Customer phone, the natural external key within a tenant.
    pub phone: String,
    pub customer_name: String,
    /// `YYYY-MM-DD`, empty until known.
    pub date: String,
    /// `HH:MM`, empty until known.
    pub time: String,
    pub party_size: i32,
    pub status: ReservationStatus,
    /// Channel the reservation came in through.
    pub source: String,
    /// Flattened conversation transcript (see `transcript`).
    pub transcript: String,
    pub details: ReservationDetails,
    /// Free-text notes entered by staff, never touched by the agent.
    pub staff_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a reservation insert.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub tenant_id: Uuid,
    pub phone: String,
    pub customer_name: String,
    pub date: String,
    pub time: String,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub source: String,
    pub transcript: String,
    pub details: ReservationDetails,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub customer_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub party_size: Option<i32>,
    pub transcript: Option<String>,
    pub details: Option<ReservationDetails>,
}

/// The write the orchestrator should perform after a turn.
#[derive(Debug, Clone)]
pub enum ReservationWrite {
    Create(NewReservation),
    Update { id: Uuid, patch: ReservationPatch },
}

/// Decide what to write after a turn, given the reservation that anchored
/// the conversation (if any) and the payload parsed from the reply (if any).
pub fn apply_to_reservation(
    tenant_id: Uuid,
    phone: &str,
    existing: Option<&Reservation>,
    payload: Option<&ReservationPayload>,
    transcript: String,
) -> ReservationWrite {
    match (existing, payload) {
        // No confirmation yet: keep accumulating transcript on the open row.
        (Some(reservation), None) => ReservationWrite::Update {
            id: reservation.id,
            patch: ReservationPatch {
                transcript: Some(transcript),
                ..Default::default()
            },
        },

        // First contact from this phone: placeholder row anchors the thread.
        (None, None) => ReservationWrite::Create(NewReservation {
            tenant_id,
            phone: phone.to_string(),
            customer_name: PLACEHOLDER_NAME.to_string(),
            date: String::new(),
            time: String::new(),
            party_size: 0,
            status: ReservationStatus::Pending,
            source: "whatsapp".to_string(),
            transcript,
            details: ReservationDetails::default(),
        }),

        // Confirmation against an open row: field-wise merge, new wins only
        // when provided.
        (Some(reservation), Some(payload)) => {
            let details = reservation.details.merged_with(&payload.details());
            ReservationWrite::Update {
                id: reservation.id,
                patch: ReservationPatch {
                    customer_name: payload.name.clone().filter(|v| !v.trim().is_empty()),
                    date: payload.date.clone().filter(|v| !v.trim().is_empty()),
                    time: payload.time.clone().filter(|v| !v.trim().is_empty()),
                    party_size: payload.party_size(),
                    transcript: Some(transcript),
                    details: Some(details),
                },
            }
        }

        // Confirmation with no prior row: create directly from the payload.
        (None, Some(payload)) => ReservationWrite::Create(NewReservation {
            tenant_id,
            phone: phone.to_string(),
            customer_name: payload
                .name
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
            date: payload.date.clone().unwrap_or_default(),
            time: payload.time.clone().unwrap_or_default(),
            party_size: payload.party_size().unwrap_or(0),
            status: ReservationStatus::Pending,
            source: "whatsapp".to_string(),
            transcript,
            details: payload.details(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_reservation() -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            phone: "+34600111222".to_string(),
            customer_name: PLACEHOLDER_NAME.to_string(),
            date: String::new(),
            time: String::new(),
            party_size: 0,
            status: ReservationStatus::Pending,
            source: "whatsapp".to_string(),
            transcript: "Customer: hola\nAI: hola".to_string(),
            details: ReservationDetails {
                allergies: Some("shellfish".to_string()),
                ..Default::default()
            },
            staff_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_payload_no_existing_creates_placeholder() {
        let tenant = Uuid::new_v4();
        let write = apply_to_reservation(tenant, "+34600", None, None, "t".to_string());
        match write {
            ReservationWrite::Create(new) => {
                assert_eq!(new.customer_name, PLACEHOLDER_NAME);
                assert_eq!(new.status, ReservationStatus::Pending);
                assert_eq!(new.party_size, 0);
                assert!(new.date.is_empty());
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_no_payload_with_existing_updates_transcript_only() {
        let existing = existing_reservation();
        let write = apply_to_reservation(
            existing.tenant_id,
            &existing.phone,
            Some(&existing),
            None,
            "new transcript".to_string(),
        );
        match write {
            ReservationWrite::Update { id, patch } => {
                assert_eq!(id, existing.id);
                assert_eq!(patch.transcript.as_deref(), Some("new transcript"));
                assert!(patch.customer_name.is_none());
                assert!(patch.party_size.is_none());
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_merge_keeps_prior_allergies_when_payload_omits_them() {
        let existing = existing_reservation();
        let payload: ReservationPayload = serde_json::from_str(
            r#"{"name":"Ana","pax":2,"date":"2025-03-01","time":"20:00","notes":"window seat"}"#,
        )
        .unwrap();
        let write = apply_to_reservation(
            existing.tenant_id,
            &existing.phone,
            Some(&existing),
            Some(&payload),
            "t".to_string(),
        );
        match write {
            ReservationWrite::Update { patch, .. } => {
                assert_eq!(patch.customer_name.as_deref(), Some("Ana"));
                assert_eq!(patch.party_size, Some(2));
                let details = patch.details.unwrap();
                assert_eq!(details.allergies.as_deref(), Some("shellfish"));
                assert_eq!(details.notes.as_deref(), Some("window seat"));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_payload_without_existing_creates_directly() {
        let payload: ReservationPayload = serde_json::from_str(
            r#"{"name":"Ana","pax":"4","date":"2025-03-01","time":"20:00"}"#,
        )
        .unwrap();
        let write =
            apply_to_reservation(Uuid::new_v4(), "+34600", None, Some(&payload), "t".to_string());
        match write {
            ReservationWrite::Create(new) => {
                assert_eq!(new.customer_name, "Ana");
                assert_eq!(new.party_size, 4);
                assert_eq!(new.date, "2025-03-01");
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_non_numeric_pax_keeps_prior_value() {
        let existing = existing_reservation();
        let payload: ReservationPayload =
            serde_json::from_str(r#"{"name":"Ana","pax":"a few"}"#).unwrap();
        let write = apply_to_reservation(
            existing.tenant_id,
            &existing.phone,
            Some(&existing),
            Some(&payload),
            "t".to_string(),
        );
        match write {
            ReservationWrite::Update { patch, .. } => {
                assert_eq!(patch.party_size, None);
                assert_eq!(patch.customer_name.as_deref(), Some("Ana"));
            }
            _ => panic!("expected update"),
        }
    }
}
