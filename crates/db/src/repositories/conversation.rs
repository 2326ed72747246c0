use async_trait::async_trait;
use sqlx::Row;

use selly_core::domain::session::{ChatMessage, ChatRole, SessionId};

use super::{parse_role, ConversationLog, RepositoryError};
use crate::DbPool;

pub struct SqlConversationLog {
    pool: DbPool,
}

impl SqlConversationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationLog for SqlConversationLog {
    async fn create_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chat_session (session_id) VALUES (?)")
            .bind(&session_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chat_message (session_id, role, content) VALUES (?, ?, ?)")
            .bind(&session_id.0)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_lead_email(
        &self,
        session_id: &SessionId,
        email: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE chat_session SET lead_email = ? WHERE session_id = ?")
            .bind(email)
            .bind(&session_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn messages_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content FROM chat_message WHERE session_id = ? ORDER BY id",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.try_get("role")?;
                let content: String = row.try_get("content")?;
                Ok(ChatMessage { role: parse_role(&role)?, content })
            })
            .collect()
    }
}
