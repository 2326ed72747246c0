use async_trait::async_trait;
use thiserror::Error;

use selly_core::domain::lead::Lead;
use selly_core::domain::session::{ChatMessage, ChatRole, SessionId};

pub mod conversation;
pub mod lead;
pub mod memory;

pub use conversation::SqlConversationLog;
pub use lead::SqlLeadRepository;
pub use memory::{InMemoryConversationLog, InMemoryLeadRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only per-session message log. Within one turn, callers await each
/// append before issuing the next so the stored order matches production
/// order.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn create_session(&self, session_id: &SessionId) -> Result<(), RepositoryError>;

    async fn append_message(
        &self,
        session_id: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<(), RepositoryError>;

    async fn set_lead_email(
        &self,
        session_id: &SessionId,
        email: &str,
    ) -> Result<(), RepositoryError>;

    async fn messages_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
}

/// Lead-by-email lookup table; email is the idempotency key.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn upsert(&self, lead: &Lead) -> Result<(), RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError>;
}

pub(crate) fn parse_role(raw: &str) -> Result<ChatRole, RepositoryError> {
    match raw {
        "system" => Ok(ChatRole::System),
        "user" => Ok(ChatRole::User),
        "assistant" => Ok(ChatRole::Assistant),
        other => Err(RepositoryError::Decode(format!("unknown chat role `{other}`"))),
    }
}
