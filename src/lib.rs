//! bookline — multi-tenant WhatsApp reservation agent.
//!
//! One inbound customer message drives one turn: the webhook resolves the
//! tenant, the transcript is rebuilt from the reservation record, an LLM
//! proposes the next reply (optionally asking for a deterministic
//! availability check first), a trailing confirmation payload is parsed
//! and merged, and the reply goes back out through the WhatsApp Cloud API.

pub mod availability;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod reservation;
pub mod store;
pub mod transcript;
