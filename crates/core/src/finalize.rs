use std::sync::Arc;

use thiserror::Error;

use crate::catalog::CatalogConnector;
use crate::domain::catalog::{CatalogAttribute, CatalogQuery, CatalogRecord};
use crate::domain::confirmation::{ConfirmationRecord, ResolvedCourse, ResolvedDegree};
use crate::domain::session::Session;
use crate::domain::slot::{SlotName, SlotValue};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FinalizeError {
    #[error("enrollment incomplete, slots not valid: {missing:?}")]
    Incomplete { missing: Vec<SlotName> },
    #[error("catalog unavailable during finalization: {0}")]
    CatalogUnavailable(String),
    #[error("{slot} value `{value}` no longer resolves in the catalog")]
    UnresolvedReference { slot: SlotName, value: String },
}

/// Turns a complete session into a confirmation record. Performs no delivery.
pub struct EnrollmentFinalizer {
    catalog: Arc<dyn CatalogConnector>,
}

impl EnrollmentFinalizer {
    pub fn new(catalog: Arc<dyn CatalogConnector>) -> Self {
        Self { catalog }
    }

    pub async fn finalize(&self, session: &Session) -> Result<ConfirmationRecord, FinalizeError> {
        if !session.is_complete() {
            return Err(FinalizeError::Incomplete { missing: session.unsatisfied() });
        }

        let field_of_study = required_text(session, SlotName::FieldOfStudy)?;
        let degree_type = required_text(session, SlotName::DegreeType)?;
        let degree_id = required_text(session, SlotName::DegreeId)?;
        let contact_email = required_text(session, SlotName::Email)?;
        let selection = match session.value(SlotName::Courses) {
            Some(SlotValue::Selection(selection)) => selection.clone(),
            _ => return Err(FinalizeError::Incomplete { missing: vec![SlotName::Courses] }),
        };

        // Same scope the degree validator accepted the id under.
        let degree_query = CatalogQuery::degrees()
            .with(CatalogAttribute::Id, degree_id.as_str())
            .with(CatalogAttribute::Category, field_of_study.as_str())
            .with(CatalogAttribute::DegreeType, degree_type.as_str());
        let mut degrees = self.lookup(&degree_query).await?;
        if degrees.len() != 1 {
            tracing::warn!(
                event_name = "enrollment.degree_unresolved",
                session_id = %session.id().0,
                degree_id = %degree_id,
                matches = degrees.len(),
                "degree does not resolve to exactly one catalog record"
            );
            return Err(FinalizeError::UnresolvedReference {
                slot: SlotName::DegreeId,
                value: degree_id,
            });
        }
        let degree = degrees.remove(0);

        let mut courses = self
            .lookup(&CatalogQuery::courses().with(CatalogAttribute::Degree, degree_id.as_str()))
            .await?;
        courses.sort_by(|left, right| left.id.cmp(&right.id));

        let electives = selection
            .iter()
            .map(|course_id| {
                courses
                    .iter()
                    .find(|record| !record.mandatory && &record.id == course_id)
                    .map(resolved_course)
                    .ok_or_else(|| FinalizeError::UnresolvedReference {
                        slot: SlotName::Courses,
                        value: course_id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mandatory_courses =
            courses.iter().filter(|record| record.mandatory).map(resolved_course).collect();

        let record = ConfirmationRecord::new(
            session.id().clone(),
            session.language(),
            field_of_study.clone(),
            ResolvedDegree {
                id: degree.id,
                name: degree.name,
                degree_type: degree.degree_type.unwrap_or(degree_type),
                category: degree.category.unwrap_or(field_of_study),
            },
            electives,
            mandatory_courses,
            contact_email,
        );

        tracing::info!(
            event_name = "enrollment.finalized",
            session_id = %session.id().0,
            confirmation_id = %record.confirmation_id().0,
            degree_id = %record.degree().id,
            electives = record.electives().len(),
            mandatory = record.mandatory_courses().len(),
            "confirmation record assembled"
        );
        Ok(record)
    }

    async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, FinalizeError> {
        let records = self.catalog.lookup(query).await.map_err(|error| {
            tracing::warn!(
                event_name = "catalog.lookup_failed",
                error = %error,
                "catalog lookup failed during finalization"
            );
            FinalizeError::CatalogUnavailable(error.to_string())
        })?;
        Ok(records.into_iter().filter(|record| record.matches(query)).collect())
    }
}

fn required_text(session: &Session, slot: SlotName) -> Result<String, FinalizeError> {
    session
        .valid_text(slot)
        .map(str::to_owned)
        .ok_or_else(|| FinalizeError::Incomplete { missing: vec![slot] })
}

fn resolved_course(record: &CatalogRecord) -> ResolvedCourse {
    ResolvedCourse { id: record.id.clone(), name: record.name.clone() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{EnrollmentFinalizer, FinalizeError};
    use crate::aliases::{BACHELORS, ENGINEERING};
    use crate::catalog::{demo_records, CatalogConnector, InMemoryCatalog};
    use crate::domain::catalog::CatalogRecord;
    use crate::domain::language::Language;
    use crate::domain::session::Session;
    use crate::domain::slot::SlotName;
    use crate::flows::{CascadeController, EnrollmentFlow};
    use crate::validators::testing::UnavailableCatalog;
    use crate::validators::ValidatorSet;

    async fn complete_session(catalog: Arc<dyn CatalogConnector>) -> Session {
        let controller =
            CascadeController::new(EnrollmentFlow::standard(), ValidatorSet::standard(catalog));
        let mut session = controller.start_session(Language::English);
        for (slot, raw) in [
            (SlotName::FieldOfStudy, "engineering"),
            (SlotName::DegreeType, "bachelor"),
            (SlotName::DegreeId, "101"),
            (SlotName::Courses, "105"),
            (SlotName::Courses, "103"),
            (SlotName::Email, "anna@example.org"),
        ] {
            controller.submit(&mut session, slot, raw).await.expect("submit");
        }
        assert!(session.is_complete());
        session
    }

    #[tokio::test]
    async fn resolves_names_and_attaches_mandatory_courses() {
        let catalog: Arc<dyn CatalogConnector> = Arc::new(InMemoryCatalog::demo());
        let session = complete_session(catalog.clone()).await;

        let record = EnrollmentFinalizer::new(catalog).finalize(&session).await.expect("record");

        assert_eq!(record.field_of_study(), ENGINEERING);
        assert_eq!(record.degree().name, "Ingegneria Civile");
        assert_eq!(record.degree().degree_type, BACHELORS);
        assert_eq!(
            record.electives().iter().map(|course| course.name.as_str()).collect::<Vec<_>>(),
            vec!["Geologia Applicata", "Fisica Tecnica"]
        );
        assert_eq!(
            record.mandatory_courses().iter().map(|course| course.id.as_str()).collect::<Vec<_>>(),
            vec!["107", "108"]
        );
        assert_eq!(record.contact_email(), "anna@example.org");
        assert_eq!(record.language(), Language::English);
        assert_eq!(record.session_id(), session.id());
    }

    #[tokio::test]
    async fn degree_resolves_within_the_validated_scope() {
        let mut records = vec![CatalogRecord::degree(
            "101",
            "Other Degree",
            "Computer Science",
            "Master's Degree",
        )];
        records.extend(demo_records());
        let catalog: Arc<dyn CatalogConnector> = Arc::new(InMemoryCatalog::new(records));
        let session = complete_session(catalog.clone()).await;

        let record = EnrollmentFinalizer::new(catalog).finalize(&session).await.expect("record");

        assert_eq!(record.degree().name, "Ingegneria Civile");
        assert_eq!(record.degree().category, ENGINEERING);
        assert_eq!(record.degree().degree_type, BACHELORS);
    }

    #[tokio::test]
    async fn duplicate_degree_in_scope_is_not_picked_arbitrarily() {
        let session = complete_session(Arc::new(InMemoryCatalog::demo())).await;
        let catalog = InMemoryCatalog::demo();
        catalog.insert(CatalogRecord::degree("101", "Shadow Degree", ENGINEERING, BACHELORS));

        let error = EnrollmentFinalizer::new(Arc::new(catalog))
            .finalize(&session)
            .await
            .expect_err("ambiguous");

        assert_eq!(
            error,
            FinalizeError::UnresolvedReference {
                slot: SlotName::DegreeId,
                value: "101".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn incomplete_session_is_refused_with_missing_slots() {
        let session = Session::new(SlotName::ALL, Language::Italian);
        let finalizer = EnrollmentFinalizer::new(Arc::new(InMemoryCatalog::demo()));

        let error = finalizer.finalize(&session).await.expect_err("incomplete");

        assert_eq!(error, FinalizeError::Incomplete { missing: SlotName::ALL.to_vec() });
    }

    #[tokio::test]
    async fn degree_removed_from_catalog_is_unresolved() {
        let session = complete_session(Arc::new(InMemoryCatalog::demo())).await;
        let finalizer = EnrollmentFinalizer::new(Arc::new(InMemoryCatalog::new(Vec::new())));

        let error = finalizer.finalize(&session).await.expect_err("gone");

        assert_eq!(
            error,
            FinalizeError::UnresolvedReference {
                slot: SlotName::DegreeId,
                value: "101".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn catalog_outage_is_reported_not_swallowed() {
        let session = complete_session(Arc::new(InMemoryCatalog::demo())).await;
        let finalizer = EnrollmentFinalizer::new(Arc::new(UnavailableCatalog));

        let error = finalizer.finalize(&session).await.expect_err("down");

        assert!(matches!(error, FinalizeError::CatalogUnavailable(_)));
    }
}
