use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use selly_core::config::DatabaseConfig;

    use super::run_pending;
    use crate::connect;

    #[tokio::test]
    async fn migrations_create_conversation_tables() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&config).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name IN ('chat_session', 'chat_message', 'lead')",
        )
        .fetch_one(&pool)
        .await
        .expect("check tables")
        .get::<i64, _>("count");

        assert_eq!(count, 3);
        pool.close().await;
    }
}
