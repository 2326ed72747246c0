//! Tool dispatch: turns an LLM function call into one side effect against
//! the CRM card tracker or the meeting calendar, and folds the outcome into
//! an action record the transcript carries back to the model.
//!
//! Provider failures are never fatal to the turn. Every error collapses into
//! a `falha` record so the model can apologize and steer the conversation.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use selly_core::domain::lead::{Lead, LeadInfo};

use crate::llm::{
    ToolCall, TOOL_CREATE_OR_UPDATE_CARD, TOOL_GET_AVAILABLE_SLOTS, TOOL_SCHEDULE_MEETING,
};

pub const STATUS_SUCCESS: &str = "sucesso";
pub const STATUS_FAILURE: &str = "falha";

/// How many slots the model is offered per lookup. A short list keeps the
/// reply readable and nudges the lead toward a quick choice.
pub const SLOT_SAMPLE_SIZE: usize = 3;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider returned an unexpected payload: {0}")]
    Protocol(String),
}

/// Reference to the lead's card in the external CRM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardRef {
    pub id: String,
}

/// One bookable meeting window, instants in ISO 8601. Providers do not
/// always report the end of the window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Result of a booking attempt. A missing meeting URL means the calendar
/// accepted the request but produced no meeting, which counts as a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingOutcome {
    pub meeting_url: Option<String>,
    pub start_time: Option<String>,
}

#[async_trait]
pub trait CardTracker: Send + Sync {
    async fn find_card_by_email(&self, email: &str) -> Result<Option<CardRef>, ProviderError>;
    async fn create_card(&self, fields: &[(&'static str, String)]) -> Result<CardRef, ProviderError>;
    async fn update_card(
        &self,
        card: &CardRef,
        fields: &[(&'static str, String)],
    ) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn available_slots_next_7_days(&self) -> Result<Vec<Slot>, ProviderError>;
    async fn schedule(&self, slot: &Slot, lead: &Lead) -> Result<BookingOutcome, ProviderError>;
}

/// Outcome of one dispatched call, rendered into the transcript as a
/// synthetic assistant message so the follow-up completion can narrate it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRecord {
    pub name: String,
    pub result: Value,
}

impl ActionRecord {
    fn success(name: &str, result: Value) -> Self {
        Self { name: name.to_string(), result: with_status(result, STATUS_SUCCESS) }
    }

    fn failure(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            result: json!({ "status": STATUS_FAILURE, "detalhe": reason.into() }),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.get("status").and_then(Value::as_str) == Some(STATUS_SUCCESS)
    }

    pub fn render(&self) -> String {
        format!("Action: {}, Result: {}", self.name, self.result)
    }
}

fn with_status(mut result: Value, status: &str) -> Value {
    if let Some(object) = result.as_object_mut() {
        object.insert("status".to_string(), Value::String(status.to_string()));
    }
    result
}

pub struct ToolDispatcher {
    cards: Arc<dyn CardTracker>,
    calendar: Arc<dyn CalendarProvider>,
}

impl ToolDispatcher {
    pub fn new(cards: Arc<dyn CardTracker>, calendar: Arc<dyn CalendarProvider>) -> Self {
        Self { cards, calendar }
    }

    /// Executes one function call against the lead's current state. The lead
    /// is mutated in place (argument fields merged, meeting details recorded
    /// after a booking) while the session lock is held by the caller.
    pub async fn dispatch(&self, call: &ToolCall, lead: &mut Lead) -> ActionRecord {
        match call.name.as_str() {
            TOOL_CREATE_OR_UPDATE_CARD => self.create_or_update_card(call, lead).await,
            TOOL_GET_AVAILABLE_SLOTS => self.available_slots().await,
            TOOL_SCHEDULE_MEETING => self.schedule_meeting(call, lead).await,
            other => {
                warn!(tool = other, "model requested an unknown tool");
                ActionRecord::failure(other, format!("ferramenta desconhecida: {other}"))
            }
        }
    }

    async fn create_or_update_card(&self, call: &ToolCall, lead: &mut Lead) -> ActionRecord {
        if let Err(record) = merge_lead_args(call, lead) {
            return record;
        }

        let Some(email) = lead.email.clone().filter(|email| !email.trim().is_empty()) else {
            return ActionRecord::failure(&call.name, "lead sem email; card não identificável");
        };

        match self.upsert_card(&call.name, &email, lead).await {
            Ok(record) => record,
            Err(error) => {
                warn!(tool = %call.name, %error, "card tracker call failed");
                ActionRecord::failure(&call.name, error.to_string())
            }
        }
    }

    async fn upsert_card(
        &self,
        tool: &str,
        email: &str,
        lead: &Lead,
    ) -> Result<ActionRecord, ProviderError> {
        match self.cards.find_card_by_email(email).await? {
            Some(card) => {
                // Identity fields never change on an existing card: email is
                // the lookup key and interesse_confirmado was fixed at
                // creation time.
                let fields: Vec<(&'static str, String)> = lead
                    .card_fields()
                    .into_iter()
                    .filter(|(key, _)| *key != "email" && *key != "interesse_confirmado")
                    .collect();
                self.cards.update_card(&card, &fields).await?;
                Ok(ActionRecord::success(
                    tool,
                    json!({ "operacao": "atualizado", "card_id": card.id }),
                ))
            }
            None => {
                let card = self.cards.create_card(&lead.card_fields()).await?;
                Ok(ActionRecord::success(tool, json!({ "operacao": "criado", "card_id": card.id })))
            }
        }
    }

    async fn available_slots(&self) -> ActionRecord {
        match self.calendar.available_slots_next_7_days().await {
            Ok(slots) => {
                let offered = sample_slots(slots);
                match serde_json::to_value(&offered) {
                    Ok(slots_value) => ActionRecord::success(
                        TOOL_GET_AVAILABLE_SLOTS,
                        json!({ "slots": slots_value }),
                    ),
                    Err(error) => ActionRecord::failure(TOOL_GET_AVAILABLE_SLOTS, error.to_string()),
                }
            }
            Err(error) => {
                warn!(tool = TOOL_GET_AVAILABLE_SLOTS, %error, "slot lookup failed");
                ActionRecord::failure(TOOL_GET_AVAILABLE_SLOTS, error.to_string())
            }
        }
    }

    async fn schedule_meeting(&self, call: &ToolCall, lead: &mut Lead) -> ActionRecord {
        if let Err(record) = merge_lead_args(call, lead) {
            return record;
        }

        let Some(start) = call
            .args
            .pointer("/slot/start")
            .and_then(Value::as_str)
            .filter(|start| !start.trim().is_empty())
        else {
            return ActionRecord::failure(&call.name, "slot.start ausente ou vazio");
        };

        let end = call
            .args
            .pointer("/slot/end")
            .and_then(Value::as_str)
            .map(|end| end.trim().to_string())
            .filter(|end| !end.is_empty());
        let slot = Slot { start: start.trim().to_string(), end };

        let outcome = match self.calendar.schedule(&slot, lead).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(tool = %call.name, %error, "booking call failed");
                return ActionRecord::failure(&call.name, error.to_string());
            }
        };

        let Some(meeting_url) = outcome.meeting_url.filter(|url| !url.trim().is_empty()) else {
            return ActionRecord::failure(&call.name, "agendamento sem link de reunião");
        };

        // Prefer the provider's confirmed start over the requested one.
        let meeting_datetime = outcome
            .start_time
            .filter(|start| !start.trim().is_empty())
            .unwrap_or_else(|| slot.start.clone());

        lead.meeting_link = Some(meeting_url.clone());
        lead.meeting_datetime = Some(meeting_datetime.clone());

        // Best-effort card sync; the meeting itself already exists, so a
        // tracker hiccup must not fail the booking.
        let card_sync = match lead.email.as_deref() {
            Some(email) => match self.upsert_card(&call.name, email, lead).await {
                Ok(_) => STATUS_SUCCESS,
                Err(error) => {
                    warn!(tool = %call.name, %error, "post-booking card sync failed");
                    STATUS_FAILURE
                }
            },
            None => STATUS_FAILURE,
        };

        ActionRecord::success(
            &call.name,
            json!({
                "meeting_link": meeting_url,
                "meeting_datetime": meeting_datetime,
                "card_sync": card_sync,
            }),
        )
    }
}

/// Merges the `lead` argument (when present) into the session lead. The
/// model often repeats fields here; they go through the same validation as
/// structured `info` output.
fn merge_lead_args(call: &ToolCall, lead: &mut Lead) -> Result<(), ActionRecord> {
    let Some(lead_args) = call.args.get("lead") else {
        return Ok(());
    };
    if lead_args.is_null() {
        return Ok(());
    }

    let parsed = LeadInfo::from_value(lead_args)
        .map_err(|error| ActionRecord::failure(&call.name, error.to_string()))?;
    lead.apply_info(&parsed.info);
    if !parsed.unknown_keys.is_empty() {
        warn!(tool = %call.name, keys = ?parsed.unknown_keys, "ignoring unknown lead fields");
    }

    if let Some(link) = lead_args.get("meeting_link").and_then(Value::as_str) {
        if !link.trim().is_empty() {
            lead.meeting_link = Some(link.trim().to_string());
        }
    }

    Ok(())
}

/// At most `SLOT_SAMPLE_SIZE` slots, randomly sampled, then ordered by start
/// so the offer always reads chronologically.
fn sample_slots(slots: Vec<Slot>) -> Vec<Slot> {
    let mut offered: Vec<Slot> = if slots.len() <= SLOT_SAMPLE_SIZE {
        slots
    } else {
        slots.choose_multiple(&mut rand::thread_rng(), SLOT_SAMPLE_SIZE).cloned().collect()
    };
    offered.sort_by(|a, b| a.start.cmp(&b.start));
    offered
}
