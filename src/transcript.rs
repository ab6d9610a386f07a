//! Conversation transcript codec.
//!
//! A conversation is persisted as a single flat string on the reservation
//! record: one line per message, `Customer: ` for the guest and `AI: ` for
//! the assistant. That string is both the audit log staff read and the only
//! conversational memory the agent has, so decoding must be total — any
//! line we do not recognize is kept as a user turn rather than dropped.

use serde::{Deserialize, Serialize};

const CUSTOMER_PREFIX: &str = "Customer: ";
const ASSISTANT_PREFIX: &str = "AI: ";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Decode a stored transcript into typed turns.
///
/// Unprefixed non-empty lines are legacy data; they become user turns so
/// nothing a guest said ever disappears from context.
pub fn decode(raw: Option<&str>) -> Vec<Turn> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            if let Some(rest) = line.strip_prefix(CUSTOMER_PREFIX) {
                Turn::user(rest)
            } else if let Some(rest) = line.strip_prefix(ASSISTANT_PREFIX) {
                Turn::assistant(rest)
            } else {
                Turn::user(line)
            }
        })
        .collect()
}

/// Append one customer/assistant exchange to a stored transcript.
pub fn encode(prior: Option<&str>, customer: &str, assistant: &str) -> String {
    let pair = format!("{CUSTOMER_PREFIX}{customer}\n{ASSISTANT_PREFIX}{assistant}");
    match prior {
        Some(prior) if !prior.is_empty() => format!("{prior}\n{pair}"),
        _ => pair,
    }
}
