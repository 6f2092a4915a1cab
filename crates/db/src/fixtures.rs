use enrollment_core::catalog::demo_records;
use enrollment_core::domain::catalog::{CatalogRecord, RecordKind};
use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo degree/course catalog shared with the in-memory connector.
pub struct DemoCatalogSeed;

impl DemoCatalogSeed {
    /// Upserts every demo record; safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let records = demo_records();
        let mut tx = pool.begin().await?;

        for record in records.iter().filter(|record| record.kind == RecordKind::Degree) {
            sqlx::query(
                "INSERT INTO degree (id, name, category, degree_type) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    degree_type = excluded.degree_type",
            )
            .bind(&record.id)
            .bind(&record.name)
            .bind(required(record, record.category.as_deref(), "category")?)
            .bind(required(record, record.degree_type.as_deref(), "degree_type")?)
            .execute(&mut *tx)
            .await?;
        }

        for record in records.iter().filter(|record| record.kind == RecordKind::Course) {
            sqlx::query(
                "INSERT INTO course (id, degree_id, name, mandatory) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(degree_id, id) DO UPDATE SET
                    name = excluded.name,
                    mandatory = excluded.mandatory",
            )
            .bind(&record.id)
            .bind(required(record, record.degree_id.as_deref(), "degree_id")?)
            .bind(&record.name)
            .bind(record.mandatory)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let degrees = records.iter().filter(|record| record.kind == RecordKind::Degree).count();
        let result = SeedResult { degrees, courses: records.len() - degrees };
        tracing::info!(
            event_name = "catalog.seeded",
            degrees = result.degrees,
            courses = result.courses,
            "demo catalog loaded"
        );
        Ok(result)
    }

    /// Checks every demo record is present with the expected attributes.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for record in demo_records() {
            let present: i64 = match record.kind {
                RecordKind::Degree => {
                    sqlx::query_scalar(
                        "SELECT EXISTS(SELECT 1 FROM degree
                         WHERE id = ?1 AND name = ?2 AND category = ?3 AND degree_type = ?4)",
                    )
                    .bind(&record.id)
                    .bind(&record.name)
                    .bind(record.category.as_deref())
                    .bind(record.degree_type.as_deref())
                    .fetch_one(pool)
                    .await?
                }
                RecordKind::Course => {
                    sqlx::query_scalar(
                        "SELECT EXISTS(SELECT 1 FROM course
                         WHERE id = ?1 AND degree_id = ?2 AND name = ?3 AND mandatory = ?4)",
                    )
                    .bind(&record.id)
                    .bind(record.degree_id.as_deref())
                    .bind(&record.name)
                    .bind(record.mandatory)
                    .fetch_one(pool)
                    .await?
                }
            };
            checks.push((check_label(&record), present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for record in demo_records() {
            match record.kind {
                RecordKind::Degree => {
                    sqlx::query("DELETE FROM course WHERE degree_id = ?1")
                        .bind(&record.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("DELETE FROM degree WHERE id = ?1")
                        .bind(&record.id)
                        .execute(&mut *tx)
                        .await?;
                }
                RecordKind::Course => {}
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

fn required<'a>(
    record: &CatalogRecord,
    value: Option<&'a str>,
    field: &str,
) -> Result<&'a str, RepositoryError> {
    value.ok_or_else(|| {
        RepositoryError::Decode(format!("demo record `{}` has no {field}", record.id))
    })
}

fn check_label(record: &CatalogRecord) -> String {
    match record.kind {
        RecordKind::Degree => format!("degree {}", record.id),
        RecordKind::Course => format!(
            "course {}/{}",
            record.degree_id.as_deref().unwrap_or_default(),
            record.id
        ),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub degrees: usize,
    pub courses: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoCatalogSeed::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoCatalogSeed::verify(&pool).await.expect("verify seed");
        assert!(first_verification.all_present);
        assert_eq!(first, SeedResult { degrees: 6, courses: 20 });

        let second = DemoCatalogSeed::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoCatalogSeed::verify(&pool).await.expect("re-verify seed");
        assert!(second_verification.all_present);
        assert_eq!(first, second);
        assert_eq!(first_verification.checks, second_verification.checks);

        let degree_rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM degree")
            .fetch_one(&pool)
            .await
            .expect("count degrees");
        assert_eq!(degree_rows, 6);
    }

    #[tokio::test]
    async fn clean_removes_demo_catalog() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoCatalogSeed::load(&pool).await.expect("load seed fixtures");

        DemoCatalogSeed::clean(&pool).await.expect("clean");

        let verification = DemoCatalogSeed::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, present)| !present));
    }
}
