use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

/// Collected profile of the prospective customer. Every field stays empty
/// until the conversation supplies it. Once set, `email` identifies the
/// lead's external CRM card and is excluded from the card-update path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub empresa: Option<String>,
    #[serde(default)]
    pub necessidade: Option<String>,
    #[serde(default)]
    pub prazo: Option<String>,
    #[serde(default)]
    pub interesse_confirmado: Option<bool>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub meeting_datetime: Option<String>,
}

impl Lead {
    /// Overwrites every field the extracted info supplies, unconditionally.
    /// Users may correct earlier answers at any stage.
    pub fn apply_info(&mut self, info: &LeadInfo) {
        if let Some(nome) = &info.nome {
            self.nome = Some(nome.clone());
        }
        if let Some(email) = &info.email {
            self.email = Some(email.clone());
        }
        if let Some(empresa) = &info.empresa {
            self.empresa = Some(empresa.clone());
        }
        if let Some(necessidade) = &info.necessidade {
            self.necessidade = Some(necessidade.clone());
        }
        if let Some(prazo) = &info.prazo {
            self.prazo = Some(prazo.clone());
        }
        if let Some(confirmed) = info.interesse_confirmado {
            self.interesse_confirmado = Some(confirmed);
        }
    }

    /// Non-empty fields as CRM card attributes. `interesse_confirmado` is
    /// rendered as the literal `true`/`false` the card tracker stores.
    pub fn card_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        push_field(&mut fields, "nome", &self.nome);
        push_field(&mut fields, "email", &self.email);
        push_field(&mut fields, "empresa", &self.empresa);
        push_field(&mut fields, "necessidade", &self.necessidade);
        push_field(&mut fields, "prazo", &self.prazo);
        if let Some(confirmed) = self.interesse_confirmado {
            fields.push(("interesse_confirmado", confirmed.to_string()));
        }
        push_field(&mut fields, "meeting_link", &self.meeting_link);
        push_field(&mut fields, "meeting_datetime", &self.meeting_datetime);
        fields
    }
}

fn push_field(fields: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            fields.push((key, trimmed.to_string()));
        }
    }
}

/// Validated partial lead extracted from a single LLM turn. This is the only
/// input the stage machine accepts as a transition trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeadInfo {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub empresa: Option<String>,
    pub necessidade: Option<String>,
    pub prazo: Option<String>,
    pub interesse_confirmado: Option<bool>,
}

/// Result of parsing one turn's `info` object: the accepted fields plus any
/// keys the model invented, which callers log instead of merging blindly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedLeadInfo {
    pub info: LeadInfo,
    pub unknown_keys: Vec<String>,
}

impl ParsedLeadInfo {
    pub fn is_empty(&self) -> bool {
        self.info == LeadInfo::default()
    }
}

impl LeadInfo {
    pub fn from_value(value: &Value) -> Result<ParsedLeadInfo, DomainError> {
        let object = value.as_object().ok_or(DomainError::LeadInfoNotObject)?;

        let mut info = LeadInfo::default();
        let mut unknown_keys = Vec::new();

        for (key, raw) in object {
            match key.as_str() {
                "nome" => info.nome = text_field(raw, "nome")?,
                "email" => info.email = text_field(raw, "email")?,
                "empresa" => info.empresa = text_field(raw, "empresa")?,
                "necessidade" => info.necessidade = text_field(raw, "necessidade")?,
                "prazo" => info.prazo = text_field(raw, "prazo")?,
                "interesse_confirmado" => info.interesse_confirmado = bool_field(raw)?,
                _ => unknown_keys.push(key.clone()),
            }
        }

        Ok(ParsedLeadInfo { info, unknown_keys })
    }
}

fn text_field(raw: &Value, field: &'static str) -> Result<Option<String>, DomainError> {
    match raw {
        Value::Null => Ok(None),
        Value::String(text) => {
            let trimmed = text.trim();
            Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
        }
        _ => Err(DomainError::LeadInfoFieldType { field }),
    }
}

fn bool_field(raw: &Value) -> Result<Option<bool>, DomainError> {
    match raw {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(*flag)),
        // Models occasionally emit the boolean as a string.
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            "" => Ok(None),
            _ => Err(DomainError::LeadInfoFieldType { field: "interesse_confirmado" }),
        },
        _ => Err(DomainError::LeadInfoFieldType { field: "interesse_confirmado" }),
    }
}
