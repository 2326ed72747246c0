//! In-memory repository doubles for orchestrator and handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use selly_core::domain::lead::Lead;
use selly_core::domain::session::{ChatMessage, ChatRole, SessionId};

use super::{ConversationLog, LeadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryConversationLog {
    sessions: Mutex<HashMap<String, String>>,
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("sessions lock").len()
    }

    pub fn recorded_messages(&self, session_id: &SessionId) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .expect("messages lock")
            .get(&session_id.0)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lead_email(&self, session_id: &SessionId) -> Option<String> {
        self.sessions
            .lock()
            .expect("sessions lock")
            .get(&session_id.0)
            .filter(|email| !email.is_empty())
            .cloned()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn create_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        self.sessions.lock().expect("sessions lock").insert(session_id.0.clone(), String::new());
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        self.messages
            .lock()
            .expect("messages lock")
            .entry(session_id.0.clone())
            .or_default()
            .push(ChatMessage { role, content: content.to_string() });
        Ok(())
    }

    async fn set_lead_email(
        &self,
        session_id: &SessionId,
        email: &str,
    ) -> Result<(), RepositoryError> {
        self.sessions.lock().expect("sessions lock").insert(session_id.0.clone(), email.to_string());
        Ok(())
    }

    async fn messages_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self.recorded_messages(session_id))
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: Mutex<HashMap<String, Lead>>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lead_count(&self) -> usize {
        self.leads.lock().expect("leads lock").len()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn upsert(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let email = lead
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| RepositoryError::Decode("lead upsert requires an email".to_string()))?;

        let mut leads = self.leads.lock().expect("leads lock");
        let entry = leads.entry(email.to_string()).or_default();
        entry.email = Some(email.to_string());
        merge(&mut entry.nome, &lead.nome);
        merge(&mut entry.empresa, &lead.empresa);
        merge(&mut entry.necessidade, &lead.necessidade);
        merge(&mut entry.prazo, &lead.prazo);
        if lead.interesse_confirmado.is_some() {
            entry.interesse_confirmado = lead.interesse_confirmado;
        }
        merge(&mut entry.meeting_link, &lead.meeting_link);
        merge(&mut entry.meeting_datetime, &lead.meeting_datetime);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.leads.lock().expect("leads lock").get(email).cloned())
    }
}

fn merge(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}
