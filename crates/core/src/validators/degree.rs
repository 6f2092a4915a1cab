use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::CatalogConnector;
use crate::domain::catalog::{CatalogAttribute, CatalogQuery};
use crate::domain::session::Session;
use crate::domain::slot::SlotName;
use crate::errors::{MismatchReason, SlotError};
use crate::validators::{catalog_unavailable, require_upstream, SlotValidator};

const UPSTREAM: [SlotName; 2] = [SlotName::FieldOfStudy, SlotName::DegreeType];

/// Accepts a degree id only when exactly one catalog degree carries that id under
/// the already accepted field of study and degree type.
pub struct DegreeIdValidator {
    catalog: Arc<dyn CatalogConnector>,
}

impl DegreeIdValidator {
    pub fn new(catalog: Arc<dyn CatalogConnector>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SlotValidator for DegreeIdValidator {
    fn slot(&self) -> SlotName {
        SlotName::DegreeId
    }

    async fn validate(&self, raw: &str, session: &Session) -> Result<String, SlotError> {
        let scope = require_upstream(SlotName::DegreeId, &UPSTREAM, session)?;
        let (category, degree_type) = (scope[0], scope[1]);

        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(SlotError::NormalizationFailure {
                slot: SlotName::DegreeId,
                value: candidate.to_owned(),
            });
        }

        let query = CatalogQuery::degrees()
            .with(CatalogAttribute::Id, candidate)
            .with(CatalogAttribute::Category, category)
            .with(CatalogAttribute::DegreeType, degree_type);
        let records = self
            .catalog
            .lookup(&query)
            .await
            .map_err(|error| catalog_unavailable(SlotName::DegreeId, error))?;

        // Connectors may match loosely; only exact attribute matches count.
        let matching: Vec<_> = records.iter().filter(|record| record.matches(&query)).collect();
        let mismatch = |reason| SlotError::CatalogMismatch {
            slot: SlotName::DegreeId,
            value: candidate.to_owned(),
            scope: vec![
                (SlotName::FieldOfStudy, category.to_owned()),
                (SlotName::DegreeType, degree_type.to_owned()),
            ],
            reason,
        };

        match matching.as_slice() {
            [record] => Ok(record.id.clone()),
            [] => Err(mismatch(MismatchReason::NotFound)),
            _ => Err(mismatch(MismatchReason::Ambiguous)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::DegreeIdValidator;
    use crate::aliases::{BACHELORS, COMPUTER_SCIENCE, ENGINEERING, MASTERS};
    use crate::catalog::InMemoryCatalog;
    use crate::domain::catalog::CatalogRecord;
    use crate::domain::language::Language;
    use crate::domain::session::Session;
    use crate::domain::slot::{SlotName, SlotState, SlotValue};
    use crate::errors::{MismatchReason, SlotError};
    use crate::validators::testing::UnavailableCatalog;
    use crate::validators::SlotValidator;

    fn scoped_session(field: &str, degree_type: &str) -> Session {
        let mut session = Session::new(SlotName::ALL, Language::Italian);
        for (slot, value) in [(SlotName::FieldOfStudy, field), (SlotName::DegreeType, degree_type)]
        {
            if let Some(target) = session.slot_mut(slot) {
                target.record(
                    value,
                    Some(SlotValue::Text(value.to_owned())),
                    SlotState::Valid,
                    Default::default(),
                );
            }
        }
        session
    }

    fn validator() -> DegreeIdValidator {
        DegreeIdValidator::new(Arc::new(InMemoryCatalog::demo()))
    }

    #[tokio::test]
    async fn accepts_id_only_under_matching_field_and_type() {
        let cases = [
            (ENGINEERING, BACHELORS, "101", true),
            (ENGINEERING, MASTERS, "101", false),
            (COMPUTER_SCIENCE, BACHELORS, "101", false),
            (COMPUTER_SCIENCE, MASTERS, "101", false),
            (ENGINEERING, MASTERS, "102", true),
            (ENGINEERING, BACHELORS, "999", false),
            (COMPUTER_SCIENCE, BACHELORS, "104", true),
        ];

        for (field, degree_type, id, expected) in cases {
            let session = scoped_session(field, degree_type);
            let result = validator().validate(id, &session).await;
            assert_eq!(result.is_ok(), expected, "{field}/{degree_type}/{id}: {result:?}");
        }
    }

    #[tokio::test]
    async fn mismatch_restates_the_active_scope() {
        let session = scoped_session(ENGINEERING, MASTERS);

        let error = validator().validate(" 101 ", &session).await.expect_err("wrong type");

        assert_eq!(
            error,
            SlotError::CatalogMismatch {
                slot: SlotName::DegreeId,
                value: "101".to_owned(),
                scope: vec![
                    (SlotName::FieldOfStudy, ENGINEERING.to_owned()),
                    (SlotName::DegreeType, MASTERS.to_owned()),
                ],
                reason: MismatchReason::NotFound,
            }
        );
    }

    #[tokio::test]
    async fn duplicate_catalog_rows_are_ambiguous() {
        let catalog = InMemoryCatalog::demo();
        catalog.insert(CatalogRecord::degree("101", "Ingegneria Edile", ENGINEERING, BACHELORS));
        let validator = DegreeIdValidator::new(Arc::new(catalog));
        let session = scoped_session(ENGINEERING, BACHELORS);

        let error = validator.validate("101", &session).await.expect_err("two rows");

        assert!(matches!(
            error,
            SlotError::CatalogMismatch { reason: MismatchReason::Ambiguous, .. }
        ));
    }

    #[tokio::test]
    async fn requires_field_and_type_before_lookup() {
        let session = Session::new(SlotName::ALL, Language::Italian);

        let error = validator().validate("101", &session).await.expect_err("no scope");

        assert_eq!(
            error,
            SlotError::DependencyNotSatisfied {
                slot: SlotName::DegreeId,
                missing: vec![SlotName::FieldOfStudy, SlotName::DegreeType],
            }
        );
    }

    #[tokio::test]
    async fn connector_failure_surfaces_as_catalog_unavailable() {
        let validator = DegreeIdValidator::new(Arc::new(UnavailableCatalog));
        let session = scoped_session(ENGINEERING, BACHELORS);

        let error = validator.validate("101", &session).await.expect_err("store down");

        assert!(error.is_transient());
    }
}
