//! System prompt assembly for the reservation assistant.
//!
//! The prompt carries three things: the language the tenant wants replies
//! in, the current date (so "tomorrow" resolves deterministically), and the
//! operating policy including the exact trailing-JSON contract the
//! extractor parses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language the assistant must reply in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyLanguage {
    Es,
    En,
    #[default]
    Both,
}

impl ReplyLanguage {
    /// Parse a tenant setting; anything unrecognized falls back to `both`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "es" => ReplyLanguage::Es,
            "en" => ReplyLanguage::En,
            _ => ReplyLanguage::Both,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            ReplyLanguage::Es => "Responde SIEMPRE en español, sin importar el idioma del cliente.",
            ReplyLanguage::En => "ALWAYS reply in English, regardless of the customer's language.",
            ReplyLanguage::Both => {
                "Reply in the language the customer writes in (Spanish or English)."
            }
        }
    }
}

/// Build the system prompt for one turn.
pub fn build_system_prompt(language: ReplyLanguage, now: DateTime<Utc>) -> String {
    format!(
        "You are a restaurant reservation assistant answering WhatsApp messages.\n\
         Current date and time: {now}.\n\
         {lang}\n\
         \n\
         Rules:\n\
         - You only help with table reservations for this restaurant. Politely \
         decline anything unrelated (recipes, other venues, general chat beyond \
         greetings) and steer back to the reservation.\n\
         - Collect these six fields before confirming: customer name, party size, \
         date (YYYY-MM-DD), time (HH:MM, 24h), allergies, special notes.\n\
         - Before proposing a date and time as final, verify it with the \
         check_availability tool when it is available to you.\n\
         - Never invent availability; if a slot is rejected, tell the customer the \
         reason and ask for an alternative.\n\
         - When the customer explicitly confirms the reservation, end your reply \
         with the marker RESERVATION_JSON: followed immediately by a single JSON \
         object on the same line, exactly in this form:\n\
         RESERVATION_JSON:{{\"name\":\"...\",\"pax\":2,\"date\":\"YYYY-MM-DD\",\
         \"time\":\"HH:MM\",\"allergies\":\"...\",\"notes\":\"...\"}}\n\
         - The marker must appear only on confirmation, only once, and only at the \
         very end of the message. Everything before it is what the customer reads.",
        now = now.format("%Y-%m-%d %H:%M UTC"),
        lang = language.instruction(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language() {
        assert_eq!(ReplyLanguage::parse("es"), ReplyLanguage::Es);
        assert_eq!(ReplyLanguage::parse(" EN "), ReplyLanguage::En);
        assert_eq!(ReplyLanguage::parse("both"), ReplyLanguage::Both);
        assert_eq!(ReplyLanguage::parse("fr"), ReplyLanguage::Both);
    }

    #[test]
    fn test_prompt_enforces_spanish() {
        let prompt = build_system_prompt(ReplyLanguage::Es, Utc::now());
        assert!(prompt.contains("SIEMPRE en español"));
        assert!(prompt.contains("RESERVATION_JSON:"));
    }

    #[test]
    fn test_prompt_carries_current_date() {
        let now = "2025-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let prompt = build_system_prompt(ReplyLanguage::En, now);
        assert!(prompt.contains("2025-03-01"));
    }
}
