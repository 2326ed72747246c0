use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::Lead;
use crate::flows::Stage;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// One conversation with a prospective lead. Owned exclusively by the
/// session store and mutated only while its per-session lock is held.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub stage: Stage,
    pub lead: Lead,
}

impl Session {
    pub fn new(id: SessionId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
            stage: Stage::Initial,
            lead: Lead::default(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Sliding expiry: every activity renews the window.
    pub fn touch(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + ttl;
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ChatMessage, Session, SessionId};

    #[test]
    fn new_session_starts_unexpired_with_empty_transcript() {
        let session = Session::new(SessionId::random(), Duration::minutes(30));
        assert!(!session.is_expired(Utc::now()));
        assert!(session.messages.is_empty());
    }

    #[test]
    fn touch_extends_the_expiry_window() {
        let mut session = Session::new(SessionId::random(), Duration::zero());
        let stale_deadline = session.expires_at;
        session.touch(Duration::minutes(30));
        assert!(session.expires_at > stale_deadline);
    }

    #[test]
    fn transcript_preserves_insertion_order() {
        let mut session = Session::new(SessionId::random(), Duration::minutes(30));
        session.push_message(ChatMessage::user("olá"));
        session.push_message(ChatMessage::assistant("Olá! Qual é o seu nome?"));
        assert_eq!(session.messages[0].content, "olá");
        assert_eq!(session.messages[1].content, "Olá! Qual é o seu nome?");
    }
}
