use std::env;
use std::fs;
use std::path::Path;

use enrollment_core::config::{resolve_config_path, AppConfig};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

struct ConfigEntry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigEntry {
    ConfigEntry { key, value, env_keys }
}

fn entries(config: &AppConfig) -> Vec<ConfigEntry> {
    let notification = &config.notification;
    vec![
        entry("database.url", config.database.url.clone(), &["ENROLLMENT_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ENROLLMENT_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["ENROLLMENT_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "catalog.query_timeout_ms",
            config.catalog.query_timeout_ms.to_string(),
            &["ENROLLMENT_CATALOG_QUERY_TIMEOUT_MS"],
        ),
        entry(
            "flow.default_language",
            config.flow.default_language.to_string(),
            &["ENROLLMENT_FLOW_DEFAULT_LANGUAGE"],
        ),
        entry(
            "flow.min_elective_courses",
            config.flow.min_elective_courses.to_string(),
            &["ENROLLMENT_FLOW_MIN_ELECTIVE_COURSES"],
        ),
        entry(
            "flow.session_idle_secs",
            config.flow.session_idle_secs.to_string(),
            &["ENROLLMENT_FLOW_SESSION_IDLE_SECS"],
        ),
        entry(
            "notification.enabled",
            notification.enabled.to_string(),
            &["ENROLLMENT_NOTIFICATION_ENABLED"],
        ),
        entry(
            "notification.webhook_url",
            optional(notification.webhook_url.as_deref()),
            &["ENROLLMENT_NOTIFICATION_WEBHOOK_URL"],
        ),
        entry(
            "notification.api_token",
            notification
                .api_token
                .as_ref()
                .map(|token| redact_token(token.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
            &["ENROLLMENT_NOTIFICATION_API_TOKEN"],
        ),
        entry(
            "notification.sender_email",
            optional(notification.sender_email.as_deref()),
            &["ENROLLMENT_NOTIFICATION_SENDER_EMAIL"],
        ),
        entry(
            "notification.operator_email",
            optional(notification.operator_email.as_deref()),
            &["ENROLLMENT_NOTIFICATION_OPERATOR_EMAIL"],
        ),
        entry(
            "notification.timeout_secs",
            notification.timeout_secs.to_string(),
            &["ENROLLMENT_NOTIFICATION_TIMEOUT_SECS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ENROLLMENT_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["ENROLLMENT_SERVER_PORT"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["ENROLLMENT_LOGGING_LEVEL", "ENROLLMENT_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ENROLLMENT_LOGGING_FORMAT", "ENROLLMENT_LOG_FORMAT"],
        ),
    ]
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most a four-character prefix so operators can tell tokens apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_never_reveals_short_tokens() {
        assert_eq!(redact_token("   "), "<empty>");
        assert_eq!(redact_token("secret"), "<redacted>");
        assert_eq!(redact_token("hook-secret-value"), "hook***");
    }

    #[test]
    fn dotted_paths_resolve_nested_tables() {
        let doc: Value = "[notification]\nwebhook_url = \"https://relay.example.org\"\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "notification.webhook_url"));
        assert!(!contains_path(&doc, "notification.api_token"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
