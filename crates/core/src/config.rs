use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub pipefy: PipefyConfig,
    pub calendar: CalendarConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipefyConfig {
    pub api_url: String,
    pub token: Option<SecretString>,
    pub pipe_id: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub event_type_id: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ttl_minutes: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub pipefy_token: Option<String>,
    pub pipefy_pipe_id: Option<String>,
    pub calendar_base_url: Option<String>,
    pub calendar_api_key: Option<String>,
    pub session_ttl_minutes: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            database: DatabaseConfig {
                url: "sqlite://selly.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
                timeout_secs: 60,
            },
            pipefy: PipefyConfig {
                api_url: "https://api.pipefy.com/graphql".to_string(),
                token: None,
                pipe_id: String::new(),
                timeout_secs: 30,
            },
            calendar: CalendarConfig {
                base_url: String::new(),
                api_key: None,
                event_type_id: "3758694".to_string(),
                timeout_secs: 30,
            },
            session: SessionConfig { ttl_minutes: 30, sweep_interval_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    /// Precedence: defaults < config file < `SELLY_*` environment < explicit
    /// overrides. Validation failures are fatal at startup, never per-request.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("selly.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(pipefy) = patch.pipefy {
            if let Some(api_url) = pipefy.api_url {
                self.pipefy.api_url = api_url;
            }
            if let Some(token) = pipefy.token {
                self.pipefy.token = Some(secret_value(token));
            }
            if let Some(pipe_id) = pipefy.pipe_id {
                self.pipefy.pipe_id = pipe_id;
            }
            if let Some(timeout_secs) = pipefy.timeout_secs {
                self.pipefy.timeout_secs = timeout_secs;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = base_url;
            }
            if let Some(api_key) = calendar.api_key {
                self.calendar.api_key = Some(secret_value(api_key));
            }
            if let Some(event_type_id) = calendar.event_type_id {
                self.calendar.event_type_id = event_type_id;
            }
            if let Some(timeout_secs) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(ttl_minutes) = session.ttl_minutes {
                self.session.ttl_minutes = ttl_minutes;
            }
            if let Some(sweep_interval_secs) = session.sweep_interval_secs {
                self.session.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SELLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SELLY_SERVER_PORT") {
            self.server.port = parse_u16("SELLY_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("SELLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SELLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("SELLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SELLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SELLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELLY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SELLY_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SELLY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SELLY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SELLY_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELLY_PIPEFY_API_URL") {
            self.pipefy.api_url = value;
        }
        if let Some(value) = read_env("SELLY_PIPEFY_TOKEN") {
            self.pipefy.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SELLY_PIPEFY_PIPE_ID") {
            self.pipefy.pipe_id = value;
        }
        if let Some(value) = read_env("SELLY_PIPEFY_TIMEOUT_SECS") {
            self.pipefy.timeout_secs = parse_u64("SELLY_PIPEFY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELLY_CALENDAR_BASE_URL") {
            self.calendar.base_url = value;
        }
        if let Some(value) = read_env("SELLY_CALENDAR_API_KEY") {
            self.calendar.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SELLY_CALENDAR_EVENT_TYPE_ID") {
            self.calendar.event_type_id = value;
        }
        if let Some(value) = read_env("SELLY_CALENDAR_TIMEOUT_SECS") {
            self.calendar.timeout_secs = parse_u64("SELLY_CALENDAR_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELLY_SESSION_TTL_MINUTES") {
            self.session.ttl_minutes = parse_u64("SELLY_SESSION_TTL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("SELLY_SESSION_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs =
                parse_u64("SELLY_SESSION_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("SELLY_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SELLY_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(pipefy_token) = overrides.pipefy_token {
            self.pipefy.token = Some(secret_value(pipefy_token));
        }
        if let Some(pipe_id) = overrides.pipefy_pipe_id {
            self.pipefy.pipe_id = pipe_id;
        }
        if let Some(base_url) = overrides.calendar_base_url {
            self.calendar.base_url = base_url;
        }
        if let Some(calendar_api_key) = overrides.calendar_api_key {
            self.calendar.api_key = Some(secret_value(calendar_api_key));
        }
        if let Some(ttl_minutes) = overrides.session_ttl_minutes {
            self.session.ttl_minutes = ttl_minutes;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_pipefy(&self.pipefy)?;
        validate_calendar(&self.calendar)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("selly.toml"), PathBuf::from("config/selly.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set SELLY_LLM_API_KEY)".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation("llm.timeout_secs must be in range 1..=300".to_string()));
    }
    Ok(())
}

fn validate_pipefy(pipefy: &PipefyConfig) -> Result<(), ConfigError> {
    let missing = pipefy
        .token
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "pipefy.token is required (set SELLY_PIPEFY_TOKEN)".to_string(),
        ));
    }
    if pipefy.pipe_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pipefy.pipe_id is required (set SELLY_PIPEFY_PIPE_ID)".to_string(),
        ));
    }
    if !pipefy.api_url.starts_with("http://") && !pipefy.api_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "pipefy.api_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if !calendar.base_url.starts_with("http://") && !calendar.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "calendar.base_url must start with http:// or https:// (set SELLY_CALENDAR_BASE_URL)"
                .to_string(),
        ));
    }
    let missing = calendar
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "calendar.api_key is required (set SELLY_CALENDAR_API_KEY)".to_string(),
        ));
    }
    if calendar.event_type_id.trim().is_empty() {
        return Err(ConfigError::Validation("calendar.event_type_id must not be empty".to_string()));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.ttl_minutes == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_minutes must be greater than zero".to_string(),
        ));
    }
    if session.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "session.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    pipefy: Option<PipefyPatch>,
    calendar: Option<CalendarPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipefyPatch {
    api_url: Option<String>,
    token: Option<String>,
    pipe_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    event_type_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    ttl_minutes: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const REQUIRED_VARS: [(&str, &str); 4] = [
        ("SELLY_LLM_API_KEY", "llm-key"),
        ("SELLY_PIPEFY_TOKEN", "pipefy-token"),
        ("SELLY_PIPEFY_PIPE_ID", "pipe-1"),
        ("SELLY_CALENDAR_API_KEY", "cal-key"),
    ];

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
        env::set_var("SELLY_CALENDAR_BASE_URL", "https://calendar.example/v1");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_all() {
        clear_vars(&[
            "SELLY_LLM_API_KEY",
            "SELLY_PIPEFY_TOKEN",
            "SELLY_PIPEFY_PIPE_ID",
            "SELLY_CALENDAR_API_KEY",
            "SELLY_CALENDAR_BASE_URL",
            "SELLY_DATABASE_URL",
            "SELLY_SESSION_TTL_MINUTES",
            "SELLY_LOGGING_FORMAT",
        ]);
    }

    #[test]
    fn defaults_fail_validation_without_required_secrets() {
        let _guard = env_lock().lock().expect("env lock");
        clear_all();

        let error = AppConfig::load(LoadOptions::default()).expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("llm.api_key")
        ));
    }

    #[test]
    fn precedence_is_defaults_file_env_overrides() {
        let _guard = env_lock().lock().expect("env lock");
        clear_all();
        set_required_vars();
        env::set_var("SELLY_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("selly.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[session]
ttl_minutes = 10

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            if config.database.url != "sqlite://from-env.db" {
                return Err("env database url should win over file".to_string());
            }
            if config.session.ttl_minutes != 10 {
                return Err("file session ttl should win over defaults".to_string());
            }
            if config.logging.level != "debug" {
                return Err("override log level should win over file".to_string());
            }
            Ok(())
        })();

        clear_all();
        result.expect("precedence assertions");
    }

    #[test]
    fn env_overrides_cover_session_and_logging() {
        let _guard = env_lock().lock().expect("env lock");
        clear_all();
        set_required_vars();
        env::set_var("SELLY_SESSION_TTL_MINUTES", "5");
        env::set_var("SELLY_LOGGING_FORMAT", "json");

        let config = AppConfig::load(LoadOptions::default()).expect("config should load");
        clear_all();

        assert_eq!(config.session.ttl_minutes, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn secrets_are_not_leaked_by_debug() {
        let _guard = env_lock().lock().expect("env lock");
        clear_all();
        set_required_vars();
        env::set_var("SELLY_LLM_API_KEY", "super-secret-llm-key");

        let config = AppConfig::load(LoadOptions::default()).expect("config should load");
        clear_all();

        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-llm-key"));
        assert!(!debug.contains("pipefy-token"));
        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("super-secret-llm-key".to_string())
        );
    }

    #[test]
    fn invalid_calendar_base_url_is_rejected() {
        let _guard = env_lock().lock().expect("env lock");
        clear_all();
        set_required_vars();
        env::set_var("SELLY_CALENDAR_BASE_URL", "calendar.example");

        let error = AppConfig::load(LoadOptions::default()).expect_err("must fail");
        clear_all();

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("calendar.base_url")
        ));
    }
}
