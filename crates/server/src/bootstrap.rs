use std::sync::Arc;
use std::time::Duration;

use enrollment_agent::{
    EnrollmentRuntime, LogNotifier, RuntimeSettings, TemplateError, WebhookNotifier,
};
use enrollment_core::config::{AppConfig, ConfigError, LoadOptions};
use enrollment_core::notify::NotificationCollaborator;
use enrollment_db::{connect, migrations, DbPool, SqlCatalogConnector};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<EnrollmentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification setup failed: {0}")]
    Notifier(String),
    #[error(transparent)]
    Templates(#[from] TemplateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = Arc::new(SqlCatalogConnector::new(
        db_pool.clone(),
        Duration::from_millis(config.catalog.query_timeout_ms),
    ));
    let notifier = notifier(&config)?;
    let runtime =
        EnrollmentRuntime::new(catalog, notifier, RuntimeSettings::from_config(&config))?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        notification_enabled = config.notification.enabled,
        default_language = %config.flow.default_language,
        min_elective_courses = config.flow.min_elective_courses,
        "conversation runtime initialized"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}

fn notifier(config: &AppConfig) -> Result<Arc<dyn NotificationCollaborator>, BootstrapError> {
    let notification = &config.notification;
    if !notification.enabled {
        return Ok(Arc::new(LogNotifier));
    }

    let (Some(url), Some(sender)) = (&notification.webhook_url, &notification.sender_email) else {
        return Err(BootstrapError::Notifier(
            "notification.webhook_url and notification.sender_email are required".to_string(),
        ));
    };
    let webhook = WebhookNotifier::new(
        url.clone(),
        sender.clone(),
        notification.api_token.clone(),
        Duration::from_secs(notification.timeout_secs),
    )
    .map_err(|error| BootstrapError::Notifier(format!("{error:#}")))?;
    Ok(Arc::new(webhook))
}

#[cfg(test)]
mod tests {
    use enrollment_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(overrides: ConfigOverrides) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..overrides
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_catalog_schema() {
        let app = bootstrap(overrides(ConfigOverrides::default()))
            .await
            .expect("bootstrap should succeed with an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('degree', 'course')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("catalog tables should exist after bootstrap");
        assert_eq!(table_count, 2);
        assert_eq!(app.runtime.active_sessions().await, 0);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_notification_lacks_a_webhook() {
        let result = bootstrap(overrides(ConfigOverrides {
            notification_enabled: Some(true),
            notification_sender_email: Some("segreteria@example.org".to_string()),
            ..ConfigOverrides::default()
        }))
        .await;

        let Err(error) = result else { panic!("bootstrap should fail") };
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("webhook_url"), "{error}");
    }

    #[tokio::test]
    async fn bootstrap_reports_unreachable_database() {
        let result = bootstrap(overrides(ConfigOverrides {
            database_url: Some("sqlite:///nonexistent-dir/enrollment.db?mode=ro".to_string()),
            ..ConfigOverrides::default()
        }))
        .await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }
}
