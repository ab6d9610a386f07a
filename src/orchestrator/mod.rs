//! The per-delivery turn loop.
//!
//! One inbound WhatsApp message drives one pass through:
//! resolve tenant → rebuild history → completion (with the availability
//! tool declared) → at most one tool hop → extract/merge → persist →
//! reply. Persistence happens before the outbound send so a delivery
//! failure never loses the turn.

mod locks;

pub use locks::TurnLocks;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::availability::{self, Availability};
use crate::channels::OutboundChannel;
use crate::channels::webhook::{InboundText, WebhookPayload};
use crate::llm::{CompletionClient, CompletionOutcome, ToolCallRequest, ToolDefinition};
use crate::reservation::{self, ReservationWrite};
use crate::store::{Store, Tenant};
use crate::transcript::{self, Turn};

/// Tool round-trips executed per turn. A response that asks for another
/// tool call once the budget is spent is coerced to final text, so every
/// turn ends in an outbound message.
pub const MAX_TOOL_HOPS: usize = 1;

/// How long a pending reservation keeps anchoring its phone's conversation.
pub const SESSION_TTL_DAYS: i64 = 7;

const CHECK_AVAILABILITY: &str = "check_availability";

/// Sent when the completion provider fails mid-turn.
const COMPLETION_APOLOGY: &str =
    "Lo sentimos, ha ocurrido un error. Por favor, inténtalo de nuevo en unos minutos. / \
     Sorry, something went wrong. Please try again in a few minutes.";

/// How a delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDisposition {
    /// No extractable text message (e.g. a status callback).
    Ignored,
    /// No live tenant maps to the inbound channel id.
    NoTenantMatch,
    /// Turn ran to completion; reservation persisted, reply attempted.
    Replied,
    /// Provider failed; apology attempted, nothing persisted.
    CompletionFailed,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    completions: CompletionClient,
    outbound: Arc<dyn OutboundChannel>,
    locks: TurnLocks,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        completions: CompletionClient,
        outbound: Arc<dyn OutboundChannel>,
    ) -> Self {
        Self {
            store,
            completions,
            outbound,
            locks: TurnLocks::new(),
        }
    }

    /// Handle one webhook delivery end to end.
    pub async fn handle_delivery(&self, payload: &WebhookPayload) -> TurnDisposition {
        let Some(inbound) = payload.first_text_message() else {
            tracing::debug!("Delivery without a text message, ignoring");
            return TurnDisposition::Ignored;
        };

        let Some(tenant) = self.resolve_tenant(&inbound.phone_number_id).await else {
            tracing::warn!(
                phone_number_id = %inbound.phone_number_id,
                "No live tenant for inbound channel id, dropping turn"
            );
            return TurnDisposition::NoTenantMatch;
        };

        let _guard = self.locks.acquire(tenant.id, &inbound.from).await;
        self.run_turn(&tenant, &inbound).await
    }

    /// Match the inbound routing id against live tenants, falling back to
    /// any live tenant with a channel token when no id matches. The
    /// fallback tolerates single-tenant deployments with a misconfigured
    /// routing id and is ambiguous with several tenants, hence the warning.
    async fn resolve_tenant(&self, phone_number_id: &str) -> Option<Tenant> {
        let now = Utc::now();

        match self.store.tenants_by_channel_phone_id(phone_number_id).await {
            Ok(tenants) => {
                if let Some(tenant) = tenants.into_iter().find(|t| t.is_live(now)) {
                    return Some(tenant);
                }
            }
            Err(e) => {
                tracing::error!("Tenant lookup failed: {}", e);
                return None;
            }
        }

        match self.store.tenants_with_channel_configured().await {
            Ok(tenants) => {
                let tenant = tenants.into_iter().find(|t| t.is_live(now))?;
                tracing::warn!(
                    tenant = %tenant.id,
                    phone_number_id,
                    "Falling back to tenant by configured channel token; routing id did not match"
                );
                Some(tenant)
            }
            Err(e) => {
                tracing::error!("Tenant fallback lookup failed: {}", e);
                None
            }
        }
    }

    async fn run_turn(&self, tenant: &Tenant, inbound: &InboundText) -> TurnDisposition {
        let open = match self
            .store
            .find_open_reservation(tenant.id, &inbound.from, Duration::days(SESSION_TTL_DAYS))
            .await
        {
            Ok(open) => open,
            Err(e) => {
                tracing::error!("Open-reservation lookup failed: {}", e);
                None
            }
        };

        let prior_raw = open.as_ref().map(|r| r.transcript.as_str());
        let mut history = transcript::decode(prior_raw);
        history.push(Turn::user(inbound.body.clone()));

        let mut outcome = match self
            .completions
            .complete(
                tenant.ai_key.as_deref(),
                &history,
                vec![availability_tool()],
                tenant.reply_language,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Completion failed: {}", e);
                self.send_reply(tenant, inbound, COMPLETION_APOLOGY).await;
                return TurnDisposition::CompletionFailed;
            }
        };

        for hop in 0..MAX_TOOL_HOPS {
            let CompletionOutcome::ToolCall { call, .. } = &outcome else {
                break;
            };

            let result = self.execute_tool(tenant, call).await;
            tracing::debug!(hop, tool = %call.name, available = result.available, "Tool hop");
            history.push(Turn::system(format!(
                "{CHECK_AVAILABILITY} result: {}",
                serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string())
            )));

            outcome = match self
                .completions
                .complete(
                    tenant.ai_key.as_deref(),
                    &history,
                    Vec::new(),
                    tenant.reply_language,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Completion failed after tool hop: {}", e);
                    self.send_reply(tenant, inbound, COMPLETION_APOLOGY).await;
                    return TurnDisposition::CompletionFailed;
                }
            };
        }

        // Hop budget spent: whatever came back is the final reply.
        let final_text = outcome.coerce_text();
        let (clean_reply, payload) = reservation::extract(&final_text);

        let new_transcript = transcript::encode(prior_raw, &inbound.body, &clean_reply);
        let write = reservation::apply_to_reservation(
            tenant.id,
            &inbound.from,
            open.as_ref(),
            payload.as_ref(),
            new_transcript,
        );

        match write {
            ReservationWrite::Create(new) => {
                if let Err(e) = self.store.create_reservation(new).await {
                    tracing::error!("Reservation create failed: {}", e);
                }
            }
            ReservationWrite::Update { id, patch } => {
                if let Err(e) = self.store.update_reservation(id, patch).await {
                    tracing::error!(reservation = %id, "Reservation update failed: {}", e);
                }
            }
        }

        self.send_reply(tenant, inbound, &clean_reply).await;
        TurnDisposition::Replied
    }

    /// Run the availability check the model asked for. Unknown argument
    /// shapes fail closed through the evaluator's own date handling.
    async fn execute_tool(&self, tenant: &Tenant, call: &ToolCallRequest) -> Availability {
        if call.name != CHECK_AVAILABILITY {
            tracing::warn!(tool = %call.name, "Model requested an undeclared tool");
            return Availability::closed("Unknown tool");
        }

        let date = str_arg(&call.arguments, "date");
        let time = str_arg(&call.arguments, "time");
        let party_size = int_arg(&call.arguments, "partySize")
            .or_else(|| int_arg(&call.arguments, "party_size"))
            .unwrap_or(0);

        let booked: Vec<i32> = match self.store.reservations_for_date(tenant.id, &date).await {
            Ok(snapshot) => snapshot.iter().map(|r| r.party_size).collect(),
            Err(e) => {
                tracing::error!("Day snapshot failed, failing closed: {}", e);
                return Availability::closed("Unable to verify availability right now");
            }
        };

        availability::check_availability(
            Some(&tenant.availability),
            &booked,
            &date,
            &time,
            party_size,
        )
    }

    /// Best effort: delivery failures are logged, never retried here. The
    /// customer's next message resumes from the persisted transcript.
    async fn send_reply(&self, tenant: &Tenant, inbound: &InboundText, body: &str) {
        let Some(token) = tenant
            .whatsapp
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
        else {
            tracing::warn!(tenant = %tenant.id, "No channel access token, cannot reply");
            return;
        };

        // Prefer the tenant's configured number; fall back to the id the
        // message actually arrived on (the fallback-resolution case).
        let phone_number_id = tenant
            .whatsapp
            .phone_number_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&inbound.phone_number_id);

        if let Err(e) = self
            .outbound
            .send_text(token, phone_number_id, &inbound.from, body)
            .await
        {
            tracing::error!(tenant = %tenant.id, "Outbound send failed: {}", e);
        }
    }
}

/// JSON Schema declaration for the availability tool.
fn availability_tool() -> ToolDefinition {
    ToolDefinition {
        name: CHECK_AVAILABILITY.to_string(),
        description: "Check whether the restaurant can seat a party on a given date and time. \
             Always call this before treating a slot as confirmed."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "Requested date, YYYY-MM-DD"
                },
                "time": {
                    "type": "string",
                    "description": "Requested time, HH:MM (24h)"
                },
                "partySize": {
                    "type": "integer",
                    "description": "Number of guests"
                }
            },
            "required": ["date", "time", "partySize"]
        }),
    }
}

fn str_arg(args: &serde_json::Value, key: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Integer argument from a tool call; numbers and numeric strings are
/// accepted, anything out of `i32` range is rejected.
fn int_arg(args: &serde_json::Value, key: &str) -> Option<i32> {
    match args.get(key)? {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_schema_declares_required_fields() {
        let tool = availability_tool();
        assert_eq!(tool.name, CHECK_AVAILABILITY);
        let required = tool.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }

    #[test]
    fn test_str_arg_missing_is_empty() {
        let args = json!({"date": "2025-01-03"});
        assert_eq!(str_arg(&args, "date"), "2025-01-03");
        assert_eq!(str_arg(&args, "time"), "");
    }

    #[test]
    fn test_int_arg_accepts_number_and_numeric_string() {
        assert_eq!(int_arg(&json!({"partySize": 4}), "partySize"), Some(4));
        assert_eq!(int_arg(&json!({"partySize": " 6 "}), "partySize"), Some(6));
    }

    #[test]
    fn test_int_arg_rejects_out_of_range_and_garbage() {
        assert_eq!(int_arg(&json!({"partySize": 9000000000i64}), "partySize"), None);
        assert_eq!(int_arg(&json!({"partySize": "a few"}), "partySize"), None);
        assert_eq!(int_arg(&json!({}), "partySize"), None);
    }
}
