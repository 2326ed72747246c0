use async_trait::async_trait;
use sqlx::Row;

use selly_core::domain::lead::Lead;

use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn upsert(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let email = lead
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| RepositoryError::Decode("lead upsert requires an email".to_string()))?;

        // COALESCE keeps previously stored values when this snapshot is
        // missing a field, so repeated upserts only ever grow the record.
        sqlx::query(
            "INSERT INTO lead \
                 (email, nome, empresa, necessidade, prazo, interesse_confirmado, \
                  meeting_link, meeting_datetime, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now')) \
             ON CONFLICT(email) DO UPDATE SET \
                 nome = COALESCE(excluded.nome, lead.nome), \
                 empresa = COALESCE(excluded.empresa, lead.empresa), \
                 necessidade = COALESCE(excluded.necessidade, lead.necessidade), \
                 prazo = COALESCE(excluded.prazo, lead.prazo), \
                 interesse_confirmado = \
                     COALESCE(excluded.interesse_confirmado, lead.interesse_confirmado), \
                 meeting_link = COALESCE(excluded.meeting_link, lead.meeting_link), \
                 meeting_datetime = COALESCE(excluded.meeting_datetime, lead.meeting_datetime), \
                 updated_at = datetime('now')",
        )
        .bind(email)
        .bind(&lead.nome)
        .bind(&lead.empresa)
        .bind(&lead.necessidade)
        .bind(&lead.prazo)
        .bind(lead.interesse_confirmado)
        .bind(&lead.meeting_link)
        .bind(&lead.meeting_datetime)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT email, nome, empresa, necessidade, prazo, interesse_confirmado, \
                    meeting_link, meeting_datetime \
             FROM lead WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Lead {
            email: row.try_get("email")?,
            nome: row.try_get("nome")?,
            empresa: row.try_get("empresa")?,
            necessidade: row.try_get("necessidade")?,
            prazo: row.try_get("prazo")?,
            interesse_confirmado: row.try_get("interesse_confirmado")?,
            meeting_link: row.try_get("meeting_link")?,
            meeting_datetime: row.try_get("meeting_datetime")?,
        }))
    }
}
