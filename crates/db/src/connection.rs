use std::time::Duration;

use enrollment_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Opens the catalog pool described by the `[database]` config section.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    tracing::debug!(
        event_name = "db.pool.connecting",
        url = %database.url,
        max_connections = database.max_connections,
        "opening catalog database pool"
    );
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

/// Every connection enables foreign keys, WAL and a 5s busy timeout.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
