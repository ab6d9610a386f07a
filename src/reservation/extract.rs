//! Trailing confirmation-payload parser.
//!
//! Grammar: the assistant's reply may end with `RESERVATION_JSON:` followed
//! immediately by one JSON object, nothing after it. The marker and payload
//! are stripped from the customer-visible text. A payload that matches the
//! grammar but fails to parse is logged and dropped — the turn proceeds as
//! if the assistant had not confirmed yet.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::reservation::ReservationDetails;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    // (?s) so a payload the model wraps across lines still matches.
    Regex::new(r"(?s)RESERVATION_JSON:\s*(\{.*\})\s*$").expect("marker regex is valid")
});

/// Fields the model emits on confirmation. All optional; the merge decides
/// what each missing field means.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationPayload {
    pub name: Option<String>,
    /// Party size; accepted as a number or a numeric string.
    pub pax: Option<serde_json::Value>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub occasion: Option<String>,
    pub seating: Option<String>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
}

impl ReservationPayload {
    /// Coerce `pax` to an integer. Non-numeric or out-of-range values yield
    /// `None` so the merge keeps the prior stored value instead of writing
    /// garbage.
    pub fn party_size(&self) -> Option<i32> {
        match self.pax.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The structured side channel carried by this payload.
    pub fn details(&self) -> ReservationDetails {
        ReservationDetails {
            occasion: self.occasion.clone(),
            seating: self.seating.clone(),
            allergies: self.allergies.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Split an assistant reply into the customer-visible text and, when the
/// trailing marker is present and valid, the parsed payload.
pub fn extract(text: &str) -> (String, Option<ReservationPayload>) {
    let Some(m) = MARKER.find(text) else {
        return (text.trim().to_string(), None);
    };

    let clean = text[..m.start()].trim().to_string();
    let raw_json = MARKER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|g| g.as_str())
        .unwrap_or_default();

    match serde_json::from_str::<ReservationPayload>(raw_json) {
        Ok(payload) => (clean, Some(payload)),
        Err(e) => {
            tracing::warn!("Discarding malformed reservation payload: {}", e);
            (clean, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_marker_returns_trimmed_text() {
        let (clean, payload) = extract("  ¿Para qué fecha?  ");
        assert_eq!(clean, "¿Para qué fecha?");
        assert!(payload.is_none());
    }

    #[test]
    fn test_marker_is_stripped_and_parsed() {
        let reply = "¡Perfecto! Reserva pendiente. RESERVATION_JSON:{\"name\":\"Ana\",\"pax\":2,\"date\":\"2025-03-01\",\"time\":\"20:00\",\"allergies\":\"None\",\"notes\":\"\"}";
        let (clean, payload) = extract(reply);
        assert_eq!(clean, "¡Perfecto! Reserva pendiente.");
        let payload = payload.unwrap();
        assert_eq!(payload.name.as_deref(), Some("Ana"));
        assert_eq!(payload.party_size(), Some(2));
        assert_eq!(payload.date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_marker_must_be_trailing() {
        let reply = "RESERVATION_JSON:{\"pax\":2} and then more prose";
        let (clean, payload) = extract(reply);
        assert!(payload.is_none());
        assert_eq!(clean, reply);
    }

    #[test]
    fn test_malformed_json_is_stripped_but_dropped() {
        let reply = "Done! RESERVATION_JSON:{\"name\": broken}";
        let (clean, payload) = extract(reply);
        assert_eq!(clean, "Done!");
        assert!(payload.is_none());
    }

    #[test]
    fn test_pax_as_numeric_string() {
        let (_, payload) = extract("ok RESERVATION_JSON:{\"pax\":\"6\"}");
        assert_eq!(payload.unwrap().party_size(), Some(6));
    }

    #[test]
    fn test_pax_non_numeric_is_none() {
        let (_, payload) = extract("ok RESERVATION_JSON:{\"pax\":\"a few\"}");
        assert_eq!(payload.unwrap().party_size(), None);
    }

    #[test]
    fn test_pax_out_of_range_is_none() {
        let (_, payload) = extract("ok RESERVATION_JSON:{\"pax\":9000000000}");
        assert_eq!(payload.unwrap().party_size(), None);
        let (_, payload) = extract("ok RESERVATION_JSON:{\"pax\":-3000000000}");
        assert_eq!(payload.unwrap().party_size(), None);
    }

    #[test]
    fn test_multiline_payload_matches() {
        let reply = "Confirmed.\nRESERVATION_JSON:{\"name\":\"Bo\",\n\"pax\":3}";
        let (clean, payload) = extract(reply);
        assert_eq!(clean, "Confirmed.");
        assert_eq!(payload.unwrap().party_size(), Some(3));
    }
}
