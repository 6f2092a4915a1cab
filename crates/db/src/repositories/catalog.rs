use std::time::Duration;

use async_trait::async_trait;
use enrollment_core::catalog::{CatalogConnector, CatalogError};
use enrollment_core::domain::catalog::{CatalogAttribute, CatalogQuery, CatalogRecord, RecordKind};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::DbPool;

/// Catalog connector over the `degree` and `course` tables. Filters are always
/// bound parameters and every query runs under `query_timeout`.
#[derive(Clone)]
pub struct SqlCatalogConnector {
    pool: DbPool,
    query_timeout: Duration,
}

enum Filter {
    Text(&'static str, String),
    Flag(&'static str, bool),
}

impl SqlCatalogConnector {
    pub fn new(pool: DbPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Column filters for `query`, or `None` when a filter can never match this
    /// record kind.
    fn filters(query: &CatalogQuery) -> Option<Vec<Filter>> {
        query
            .filters
            .iter()
            .map(|(attribute, value)| match (query.kind, attribute) {
                (_, CatalogAttribute::Id) => Some(Filter::Text("id", value.clone())),
                (RecordKind::Degree, CatalogAttribute::Category) => {
                    Some(Filter::Text("category", value.clone()))
                }
                (RecordKind::Degree, CatalogAttribute::DegreeType) => {
                    Some(Filter::Text("degree_type", value.clone()))
                }
                (RecordKind::Course, CatalogAttribute::Degree) => {
                    Some(Filter::Text("degree_id", value.clone()))
                }
                (RecordKind::Course, CatalogAttribute::Mandatory) => {
                    value.parse::<bool>().ok().map(|flag| Filter::Flag("mandatory", flag))
                }
                _ => None,
            })
            .collect()
    }

    fn build(query: &CatalogQuery, filters: Vec<Filter>) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(match query.kind {
            RecordKind::Degree => "SELECT id, name, category, degree_type FROM degree WHERE 1 = 1",
            RecordKind::Course => {
                "SELECT id, name, degree_id, mandatory FROM course WHERE 1 = 1"
            }
        });
        for filter in filters {
            match filter {
                Filter::Text(column, value) => {
                    builder.push(format!(" AND {column} = ")).push_bind(value);
                }
                Filter::Flag(column, flag) => {
                    builder.push(format!(" AND {column} = ")).push_bind(flag);
                }
            }
        }
        builder.push(" ORDER BY id");
        builder
    }

    fn decode(kind: RecordKind, row: &SqliteRow) -> Result<CatalogRecord, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        Ok(match kind {
            RecordKind::Degree => CatalogRecord::degree(
                id,
                name,
                row.try_get::<String, _>("category")?,
                row.try_get::<String, _>("degree_type")?,
            ),
            RecordKind::Course => CatalogRecord::course(
                id,
                name,
                row.try_get::<String, _>("degree_id")?,
                row.try_get::<bool, _>("mandatory")?,
            ),
        })
    }
}

#[async_trait]
impl CatalogConnector for SqlCatalogConnector {
    async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
        let Some(filters) = Self::filters(query) else {
            return Ok(Vec::new());
        };
        let mut builder = Self::build(query, filters);

        let rows = tokio::time::timeout(self.query_timeout, builder.build().fetch_all(&self.pool))
            .await
            .map_err(|_| {
                tracing::warn!(
                    event_name = "catalog.lookup_timed_out",
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    kind = ?query.kind,
                    "catalog query exceeded its timeout"
                );
                CatalogError::Unavailable(format!(
                    "catalog query timed out after {}ms",
                    self.query_timeout.as_millis()
                ))
            })?
            .map_err(|error| {
                tracing::warn!(
                    event_name = "catalog.lookup_failed",
                    kind = ?query.kind,
                    error = %error,
                    "catalog query failed"
                );
                match error {
                    sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::Decode(_) => CatalogError::Decode(error.to_string()),
                    other => CatalogError::Unavailable(other.to_string()),
                }
            })?;

        let records = rows
            .iter()
            .map(|row| Self::decode(query.kind, row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| CatalogError::Decode(error.to_string()))?;

        tracing::debug!(
            event_name = "catalog.lookup",
            kind = ?query.kind,
            filters = query.filters.len(),
            rows = records.len(),
            "catalog query completed"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use enrollment_core::catalog::{CatalogConnector, CatalogError};
    use enrollment_core::domain::catalog::{CatalogAttribute, CatalogQuery};

    use super::SqlCatalogConnector;
    use crate::fixtures::DemoCatalogSeed;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoCatalogSeed::load(&pool).await.expect("seed catalog");
        pool
    }

    #[tokio::test]
    async fn scoped_degree_lookup_matches_all_filters() {
        let connector = SqlCatalogConnector::new(seeded_pool().await, Duration::from_secs(2));

        let matching = connector
            .lookup(
                &CatalogQuery::degrees()
                    .with(CatalogAttribute::Id, "101")
                    .with(CatalogAttribute::Category, "Enginering")
                    .with(CatalogAttribute::DegreeType, "Bachelor's Degree"),
            )
            .await
            .expect("lookup");
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].name, "Ingegneria Civile");

        let wrong_type = connector
            .lookup(
                &CatalogQuery::degrees()
                    .with(CatalogAttribute::Id, "101")
                    .with(CatalogAttribute::DegreeType, "Master's Degree"),
            )
            .await
            .expect("lookup");
        assert!(wrong_type.is_empty());
    }

    #[tokio::test]
    async fn elective_lookup_excludes_mandatory_courses() {
        let connector = SqlCatalogConnector::new(seeded_pool().await, Duration::from_secs(2));

        let electives = connector
            .lookup(
                &CatalogQuery::courses()
                    .with(CatalogAttribute::Degree, "101")
                    .with(CatalogAttribute::Mandatory, "false"),
            )
            .await
            .expect("lookup");

        let ids: Vec<_> = electives.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["103", "105", "106"]);
        assert!(electives.iter().all(|record| !record.mandatory));
    }

    #[tokio::test]
    async fn filters_that_cannot_apply_return_nothing() {
        let connector = SqlCatalogConnector::new(seeded_pool().await, Duration::from_secs(2));

        let courses_by_category = connector
            .lookup(&CatalogQuery::courses().with(CatalogAttribute::Category, "Enginering"))
            .await
            .expect("lookup");
        assert!(courses_by_category.is_empty());

        let odd_flag = connector
            .lookup(&CatalogQuery::courses().with(CatalogAttribute::Mandatory, "maybe"))
            .await
            .expect("lookup");
        assert!(odd_flag.is_empty());
    }

    #[tokio::test]
    async fn injection_attempts_are_bound_not_interpolated() {
        let connector = SqlCatalogConnector::new(seeded_pool().await, Duration::from_secs(2));

        let result = connector
            .lookup(&CatalogQuery::degrees().with(CatalogAttribute::Id, "101' OR '1'='1"))
            .await
            .expect("lookup");

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn closed_pool_reports_unavailable() {
        let pool = seeded_pool().await;
        let connector = SqlCatalogConnector::new(pool.clone(), Duration::from_secs(2));
        pool.close().await;

        let error = connector
            .lookup(&CatalogQuery::degrees().with(CatalogAttribute::Id, "101"))
            .await
            .expect_err("pool closed");

        assert!(matches!(error, CatalogError::Unavailable(_)));
    }
}
