use std::sync::Arc;

use selly_agent::gemini::GeminiClient;
use selly_agent::llm::LlmError;
use selly_agent::orchestrator::TurnOrchestrator;
use selly_agent::prompt::{system_prompt, PRODUCT_DESCRIPTION};
use selly_agent::sessions::SessionStore;
use selly_agent::tools::{ProviderError, ToolDispatcher};
use selly_core::config::{AppConfig, ConfigError, LoadOptions};
use selly_db::{connect, migrations, DbPool, SqlConversationLog, SqlLeadRepository};
use thiserror::Error;
use tracing::{debug, info};

use crate::calendar::CalendarClient;
use crate::pipefy::PipefyClient;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<TurnOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
    #[error("integration client setup failed: {0}")]
    Provider(#[source] ProviderError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let llm = Arc::new(GeminiClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);
    let cards =
        Arc::new(PipefyClient::from_config(&config.pipefy).map_err(BootstrapError::Provider)?);
    let calendar =
        Arc::new(CalendarClient::from_config(&config.calendar).map_err(BootstrapError::Provider)?);

    let ttl = chrono::Duration::minutes(config.session.ttl_minutes as i64);
    let store = Arc::new(SessionStore::new(ttl));

    let orchestrator = Arc::new(TurnOrchestrator::new(
        llm,
        ToolDispatcher::new(cards, calendar),
        store,
        Arc::new(SqlConversationLog::new(db_pool.clone())),
        Arc::new(SqlLeadRepository::new(db_pool.clone())),
        system_prompt(PRODUCT_DESCRIPTION),
    ));
    info!(
        event_name = "system.bootstrap.ready",
        model = %config.llm.model,
        session_ttl_minutes = config.session.ttl_minutes,
        "application wired"
    );

    Ok(Application { config, db_pool, orchestrator })
}

/// Periodic eviction of expired sessions; complements the eviction-on-access
/// path so abandoned conversations do not accumulate.
pub fn spawn_session_sweeper(store: Arc<SessionStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.sweep_expired().await;
            debug!(event_name = "system.sessions.sweep", evicted, "session sweep completed");
        }
    });
}
