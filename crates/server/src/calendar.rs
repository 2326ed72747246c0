//! cal.com-style scheduling provider.
//!
//! Slot lookups cover a rolling seven-day window; the provider returns a
//! day-keyed object that gets flattened into a chronological slot list.
//! Bookings that come back without a meeting URL count as failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use selly_agent::tools::{BookingOutcome, CalendarProvider, ProviderError, Slot};
use selly_core::config::CalendarConfig;
use selly_core::domain::lead::Lead;

const MEETING_TIMEZONE: &str = "America/Sao_Paulo";
const MEETING_LANGUAGE: &str = "pt-BR";

pub struct CalendarClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    event_type_id: i64,
}

impl CalendarClient {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::Transport("calendar api key is not configured".to_string())
        })?;
        let event_type_id = config.event_type_id.trim().parse::<i64>().map_err(|_| {
            ProviderError::Transport(format!(
                "calendar.event_type_id must be numeric, got `{}`",
                config.event_type_id
            ))
        })?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            event_type_id,
        })
    }
}

#[async_trait]
impl CalendarProvider for CalendarClient {
    async fn available_slots_next_7_days(&self) -> Result<Vec<Slot>, ProviderError> {
        let start = Utc::now();
        let end = start + chrono::Duration::days(7);
        let start_time = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_time = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let event_type_id = self.event_type_id.to_string();

        let response = self
            .http
            .get(format!("{}/slots", self.base_url))
            .query(&[
                ("apiKey", self.api_key.expose_secret()),
                ("startTime", start_time.as_str()),
                ("endTime", end_time.as_str()),
                ("eventTypeId", event_type_id.as_str()),
            ])
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport(format!("calendar returned status {status}")));
        }

        let payload: Value =
            response.json().await.map_err(|error| ProviderError::Protocol(error.to_string()))?;
        let slots = flatten_slots(&payload)?;
        debug!(slots = slots.len(), "calendar slot lookup");
        Ok(slots)
    }

    async fn schedule(&self, slot: &Slot, lead: &Lead) -> Result<BookingOutcome, ProviderError> {
        let payload = booking_payload(self.event_type_id, slot, lead);

        let response = self
            .http
            .post(format!("{}/bookings", self.base_url))
            .query(&[("apiKey", self.api_key.expose_secret())])
            .json(&payload)
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport(format!("calendar returned status {status}")));
        }

        let body: Value =
            response.json().await.map_err(|error| ProviderError::Protocol(error.to_string()))?;
        Ok(parse_booking_response(&body))
    }
}

/// Flattens `{"slots": {"2026-08-24": [{"time": ...}, ...], ...}}` into a
/// chronological list. Entries may carry `start` or `time` depending on the
/// provider version.
fn flatten_slots(payload: &Value) -> Result<Vec<Slot>, ProviderError> {
    let days = payload
        .pointer("/slots")
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::Protocol("slots response missing slots object".to_string()))?;

    let mut slots = Vec::new();
    for entries in days.values() {
        let Some(entries) = entries.as_array() else {
            continue;
        };
        for entry in entries {
            let start = entry
                .get("start")
                .or_else(|| entry.get("time"))
                .and_then(Value::as_str)
                .filter(|start| !start.trim().is_empty());
            if let Some(start) = start {
                let end = entry.get("end").and_then(Value::as_str).map(str::to_string);
                slots.push(Slot { start: start.to_string(), end });
            }
        }
    }

    slots.sort_by(|a, b| a.start.cmp(&b.start));
    Ok(slots)
}

fn booking_payload(event_type_id: i64, slot: &Slot, lead: &Lead) -> Value {
    let nome = lead.nome.clone().unwrap_or_default();

    json!({
        "eventTypeId": event_type_id,
        "start": slot.start,
        "responses": {
            "name": nome,
            "email": lead.email.clone().unwrap_or_default(),
            "smsReminderNumber": "",
            "location": { "value": "userPhone", "optionValue": "" },
        },
        "timeZone": MEETING_TIMEZONE,
        "language": MEETING_LANGUAGE,
        "title": format!("Reunião entre {nome} e equipe de atendimento"),
        "description": lead.necessidade.clone().unwrap_or_default(),
        "status": "PENDING",
        "metadata": {
            "empresa": lead.empresa.clone().unwrap_or_default(),
            "necessidade": lead.necessidade.clone().unwrap_or_default(),
        },
    })
}

fn parse_booking_response(payload: &Value) -> BookingOutcome {
    let meeting_url = payload
        .pointer("/data/meetingUrl")
        .or_else(|| payload.get("meetingUrl"))
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string);
    let start_time = payload
        .pointer("/data/startTime")
        .or_else(|| payload.get("startTime"))
        .and_then(Value::as_str)
        .filter(|start| !start.trim().is_empty())
        .map(str::to_string);
    BookingOutcome { meeting_url, start_time }
}
