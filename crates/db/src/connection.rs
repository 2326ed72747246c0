use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use selly_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the conversation-log pool. The busy timeout shares the configured
/// acquire budget so a contended sqlite file fails within the same window
/// the caller already agreed to wait.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = database.timeout_secs.max(1) * 1000;

    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&database.url)
        .await
}
