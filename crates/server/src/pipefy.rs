//! Pipefy card tracker over the GraphQL API.
//!
//! Every query and mutation ships user-provided values through GraphQL
//! variables, never through string interpolation into the query text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use selly_agent::tools::{CardRef, CardTracker, ProviderError};
use selly_core::config::PipefyConfig;

const FIND_CARDS_QUERY: &str = "query FindCardByEmail($pipeId: ID!, $email: String!) { \
     findCards(pipeId: $pipeId, search: { fieldId: \"email\", fieldValue: $email }) { \
     edges { node { id } } } }";

const CREATE_CARD_MUTATION: &str = "mutation CreateCard($input: CreateCardInput!) { \
     createCard(input: $input) { card { id } } }";

const UPDATE_FIELDS_MUTATION: &str = "mutation UpdateCardFields($input: UpdateFieldsValuesInput!) { \
     updateFieldsValues(input: $input) { success } }";

pub struct PipefyClient {
    http: Client,
    api_url: String,
    token: SecretString,
    pipe_id: String,
}

impl PipefyClient {
    pub fn from_config(config: &PipefyConfig) -> Result<Self, ProviderError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| ProviderError::Transport("pipefy token is not configured".to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self { http, api_url: config.api_url.clone(), token, pipe_id: config.pipe_id.clone() })
    }

    async fn execute(&self, body: Value) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport(format!("pipefy returned status {status}")));
        }

        let payload: Value =
            response.json().await.map_err(|error| ProviderError::Protocol(error.to_string()))?;
        if let Some(errors) = payload.get("errors").filter(|errors| !errors.is_null()) {
            return Err(ProviderError::Protocol(format!("pipefy graphql errors: {errors}")));
        }

        Ok(payload)
    }
}

#[async_trait]
impl CardTracker for PipefyClient {
    async fn find_card_by_email(&self, email: &str) -> Result<Option<CardRef>, ProviderError> {
        let payload = self.execute(find_card_request(&self.pipe_id, email)).await?;
        let card = parse_find_response(&payload)?;
        debug!(found = card.is_some(), "pipefy card lookup");
        Ok(card)
    }

    async fn create_card(
        &self,
        fields: &[(&'static str, String)],
    ) -> Result<CardRef, ProviderError> {
        let payload = self.execute(create_card_request(&self.pipe_id, fields)).await?;
        parse_create_response(&payload)
    }

    async fn update_card(
        &self,
        card: &CardRef,
        fields: &[(&'static str, String)],
    ) -> Result<(), ProviderError> {
        if fields.is_empty() {
            return Ok(());
        }
        let payload = self.execute(update_card_request(&card.id, fields)).await?;
        parse_update_response(&payload)
    }
}

fn find_card_request(pipe_id: &str, email: &str) -> Value {
    json!({
        "query": FIND_CARDS_QUERY,
        "variables": { "pipeId": pipe_id, "email": email },
    })
}

fn create_card_request(pipe_id: &str, fields: &[(&'static str, String)]) -> Value {
    let attributes: Vec<Value> = fields
        .iter()
        .map(|(field_id, value)| json!({ "field_id": field_id, "field_value": value }))
        .collect();

    json!({
        "query": CREATE_CARD_MUTATION,
        "variables": { "input": { "pipe_id": pipe_id, "fields_attributes": attributes } },
    })
}

fn update_card_request(card_id: &str, fields: &[(&'static str, String)]) -> Value {
    let values: Vec<Value> = fields
        .iter()
        .map(|(field_id, value)| json!({ "fieldId": field_id, "value": value }))
        .collect();

    json!({
        "query": UPDATE_FIELDS_MUTATION,
        "variables": { "input": { "nodeId": card_id, "values": values } },
    })
}

fn parse_find_response(payload: &Value) -> Result<Option<CardRef>, ProviderError> {
    let edges = payload
        .pointer("/data/findCards/edges")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Protocol("findCards response missing edges".to_string()))?;

    Ok(edges
        .first()
        .and_then(|edge| edge.pointer("/node/id"))
        .and_then(node_id)
        .map(|id| CardRef { id }))
}

fn parse_create_response(payload: &Value) -> Result<CardRef, ProviderError> {
    payload
        .pointer("/data/createCard/card/id")
        .and_then(node_id)
        .map(|id| CardRef { id })
        .ok_or_else(|| ProviderError::Protocol("createCard response missing card id".to_string()))
}

fn parse_update_response(payload: &Value) -> Result<(), ProviderError> {
    match payload.pointer("/data/updateFieldsValues/success").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        Some(false) => {
            Err(ProviderError::Protocol("updateFieldsValues reported failure".to_string()))
        }
        None => Err(ProviderError::Protocol(
            "updateFieldsValues response missing success flag".to_string(),
        )),
    }
}

// Pipefy ids arrive as strings, but numeric ids show up in older pipes.
fn node_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
