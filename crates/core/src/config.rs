use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::language::Language;
use crate::validators::is_email_shaped;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub flow: FlowConfig,
    pub notification: NotificationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub query_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct FlowConfig {
    pub default_language: Language,
    pub min_elective_courses: u32,
    /// Conversations untouched for this long are dropped when new ones start.
    pub session_idle_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub sender_email: Option<String>,
    pub operator_email: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub default_language: Option<Language>,
    pub min_elective_courses: Option<u32>,
    pub notification_enabled: Option<bool>,
    pub notification_webhook_url: Option<String>,
    pub notification_api_token: Option<String>,
    pub notification_sender_email: Option<String>,
    pub notification_operator_email: Option<String>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["enrollment.toml", "config/enrollment.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://enrollment.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig { query_timeout_ms: 2_000 },
            flow: FlowConfig {
                default_language: Language::Italian,
                min_elective_courses: 2,
                session_idle_secs: 1_800,
            },
            notification: NotificationConfig {
                enabled: false,
                webhook_url: None,
                api_token: None,
                sender_email: None,
                operator_email: None,
                timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5055,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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

        if let Some(catalog) = patch.catalog {
            if let Some(query_timeout_ms) = catalog.query_timeout_ms {
                self.catalog.query_timeout_ms = query_timeout_ms;
            }
        }

        if let Some(flow) = patch.flow {
            if let Some(default_language) = flow.default_language {
                self.flow.default_language = parse_language(&default_language)?;
            }
            if let Some(min_elective_courses) = flow.min_elective_courses {
                self.flow.min_elective_courses = min_elective_courses;
            }
            if let Some(session_idle_secs) = flow.session_idle_secs {
                self.flow.session_idle_secs = session_idle_secs;
            }
        }

        if let Some(notification) = patch.notification {
            if let Some(enabled) = notification.enabled {
                self.notification.enabled = enabled;
            }
            if let Some(webhook_url) = notification.webhook_url {
                self.notification.webhook_url = Some(webhook_url);
            }
            if let Some(api_token) = notification.api_token {
                self.notification.api_token = Some(secret_value(api_token));
            }
            if let Some(sender_email) = notification.sender_email {
                self.notification.sender_email = Some(sender_email);
            }
            if let Some(operator_email) = notification.operator_email {
                self.notification.operator_email = Some(operator_email);
            }
            if let Some(timeout_secs) = notification.timeout_secs {
                self.notification.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ENROLLMENT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ENROLLMENT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("ENROLLMENT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ENROLLMENT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ENROLLMENT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ENROLLMENT_CATALOG_QUERY_TIMEOUT_MS") {
            self.catalog.query_timeout_ms =
                parse_u64("ENROLLMENT_CATALOG_QUERY_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("ENROLLMENT_FLOW_DEFAULT_LANGUAGE") {
            self.flow.default_language = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "ENROLLMENT_FLOW_DEFAULT_LANGUAGE".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("ENROLLMENT_FLOW_MIN_ELECTIVE_COURSES") {
            self.flow.min_elective_courses =
                parse_u32("ENROLLMENT_FLOW_MIN_ELECTIVE_COURSES", &value)?;
        }
        if let Some(value) = read_env("ENROLLMENT_FLOW_SESSION_IDLE_SECS") {
            self.flow.session_idle_secs = parse_u64("ENROLLMENT_FLOW_SESSION_IDLE_SECS", &value)?;
        }

        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_ENABLED") {
            self.notification.enabled = parse_bool("ENROLLMENT_NOTIFICATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_WEBHOOK_URL") {
            self.notification.webhook_url = Some(value);
        }
        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_API_TOKEN") {
            self.notification.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_SENDER_EMAIL") {
            self.notification.sender_email = Some(value);
        }
        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_OPERATOR_EMAIL") {
            self.notification.operator_email = Some(value);
        }
        if let Some(value) = read_env("ENROLLMENT_NOTIFICATION_TIMEOUT_SECS") {
            self.notification.timeout_secs =
                parse_u64("ENROLLMENT_NOTIFICATION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ENROLLMENT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ENROLLMENT_SERVER_PORT") {
            self.server.port = parse_u16("ENROLLMENT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ENROLLMENT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ENROLLMENT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("ENROLLMENT_LOGGING_LEVEL").or_else(|| read_env("ENROLLMENT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ENROLLMENT_LOGGING_FORMAT").or_else(|| read_env("ENROLLMENT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(default_language) = overrides.default_language {
            self.flow.default_language = default_language;
        }
        if let Some(min_elective_courses) = overrides.min_elective_courses {
            self.flow.min_elective_courses = min_elective_courses;
        }
        if let Some(enabled) = overrides.notification_enabled {
            self.notification.enabled = enabled;
        }
        if let Some(webhook_url) = overrides.notification_webhook_url {
            self.notification.webhook_url = Some(webhook_url);
        }
        if let Some(api_token) = overrides.notification_api_token {
            self.notification.api_token = Some(secret_value(api_token));
        }
        if let Some(sender_email) = overrides.notification_sender_email {
            self.notification.sender_email = Some(sender_email);
        }
        if let Some(operator_email) = overrides.notification_operator_email {
            self.notification.operator_email = Some(operator_email);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_catalog(&self.catalog)?;
        validate_flow(&self.flow)?;
        validate_notification(&self.notification)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file that `AppConfig::load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
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

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.query_timeout_ms == 0 || catalog.query_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "catalog.query_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }
    Ok(())
}

fn validate_flow(flow: &FlowConfig) -> Result<(), ConfigError> {
    if flow.min_elective_courses == 0 {
        return Err(ConfigError::Validation(
            "flow.min_elective_courses must be at least 1".to_string(),
        ));
    }
    if flow.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "flow.session_idle_secs must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_notification(notification: &NotificationConfig) -> Result<(), ConfigError> {
    if notification.enabled {
        let webhook_missing =
            notification.webhook_url.as_ref().map(|url| url.trim().is_empty()).unwrap_or(true);
        let sender_missing = notification.sender_email.is_none();
        if webhook_missing || sender_missing {
            return Err(ConfigError::Validation(
                "notification.enabled is true but webhook_url or sender_email is missing"
                    .to_string(),
            ));
        }
        let token_blank = notification
            .api_token
            .as_ref()
            .map(|token| token.expose_secret().trim().is_empty())
            .unwrap_or(false);
        if token_blank {
            return Err(ConfigError::Validation(
                "notification.api_token must not be blank when set".to_string(),
            ));
        }
    }

    if let Some(url) = &notification.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notification.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    for (key, address) in [
        ("notification.sender_email", &notification.sender_email),
        ("notification.operator_email", &notification.operator_email),
    ] {
        if let Some(address) = address {
            if !is_email_shaped(address) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be an email address, got `{address}`"
                )));
            }
        }
    }

    if notification.timeout_secs == 0 || notification.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "notification.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn parse_language(value: &str) -> Result<Language, ConfigError> {
    value.parse().map_err(|error| ConfigError::Validation(format!("flow.default_language: {error}")))
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    flow: Option<FlowPatch>,
    notification: Option<NotificationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    query_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FlowPatch {
    default_language: Option<String>,
    min_elective_courses: Option<u32>,
    session_idle_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    api_token: Option<String>,
    sender_email: Option<String>,
    operator_email: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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
    use crate::domain::language::Language;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_italian_first() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.flow.default_language == Language::Italian, "italian is the default")?;
        ensure(config.flow.min_elective_courses == 2, "two electives by default")?;
        ensure(config.flow.session_idle_secs == 1_800, "idle sessions expire after 30 minutes")?;
        ensure(!config.notification.enabled, "notification is off by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_NOTIFICATION_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("enrollment.toml");
            fs::write(
                &path,
                r#"
[notification]
enabled = true
webhook_url = "https://hooks.example.org/enrollment"
api_token = "${TEST_NOTIFICATION_TOKEN}"
sender_email = "segreteria@example.org"

[flow]
default_language = "english"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .notification
                    .api_token
                    .as_ref()
                    .is_some_and(|token| token.expose_secret() == "token-from-env"),
                "api token should be loaded from environment",
            )?;
            ensure(
                config.flow.default_language == Language::English,
                "language aliases are accepted in the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_NOTIFICATION_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ENROLLMENT_LOG_LEVEL", "warn");
        env::set_var("ENROLLMENT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["ENROLLMENT_LOG_LEVEL", "ENROLLMENT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ENROLLMENT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("ENROLLMENT_CATALOG_QUERY_TIMEOUT_MS", "750");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("enrollment.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[catalog]
query_timeout_ms = 5000

[flow]
min_elective_courses = 3
session_idle_secs = 600

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.catalog.query_timeout_ms == 750, "env timeout should win over file")?;
            ensure(config.flow.min_elective_courses == 3, "file value should win over default")?;
            ensure(config.flow.session_idle_secs == 600, "file idle timeout should be read")?;
            Ok(())
        })();

        clear_vars(&["ENROLLMENT_DATABASE_URL", "ENROLLMENT_CATALOG_QUERY_TIMEOUT_MS"]);
        result
    }

    #[test]
    fn enabled_notification_requires_webhook_and_sender() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ENROLLMENT_NOTIFICATION_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("webhook_url")
            );
            ensure(has_message, "validation failure should mention webhook_url")
        })();

        clear_vars(&["ENROLLMENT_NOTIFICATION_ENABLED"]);
        result
    }

    #[test]
    fn zero_minimum_and_bad_addresses_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let zero = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                min_elective_courses: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(zero, Err(ConfigError::Validation(ref message)) if message.contains("min_elective_courses")),
            "zero minimum should be rejected",
        )?;

        let bad_operator = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                notification_operator_email: Some("not-an-address".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(bad_operator, Err(ConfigError::Validation(ref message)) if message.contains("operator_email")),
            "operator address must be email shaped",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ENROLLMENT_NOTIFICATION_API_TOKEN", "hook-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("hook-secret-value"), "debug output should not contain token")
        })();

        clear_vars(&["ENROLLMENT_NOTIFICATION_API_TOKEN"]);
        result
    }
}
