use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::CatalogConnector;
use crate::domain::catalog::{CatalogAttribute, CatalogQuery};
use crate::domain::session::Session;
use crate::domain::slot::SlotName;
use crate::errors::{MismatchReason, SlotError};
use crate::validators::{catalog_unavailable, require_upstream, SlotValidator};

/// Accepts one elective course id of the active degree. Mandatory courses are
/// not selectable. Minimum cardinality is enforced by the controller.
pub struct CourseValidator {
    catalog: Arc<dyn CatalogConnector>,
}

impl CourseValidator {
    pub fn new(catalog: Arc<dyn CatalogConnector>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SlotValidator for CourseValidator {
    fn slot(&self) -> SlotName {
        SlotName::Courses
    }

    async fn validate(&self, raw: &str, session: &Session) -> Result<String, SlotError> {
        let scope = require_upstream(SlotName::Courses, &[SlotName::DegreeId], session)?;
        let degree_id = scope[0];

        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(SlotError::NormalizationFailure {
                slot: SlotName::Courses,
                value: candidate.to_owned(),
            });
        }

        let query = CatalogQuery::courses()
            .with(CatalogAttribute::Degree, degree_id)
            .with(CatalogAttribute::Mandatory, "false");
        let electives = self
            .catalog
            .lookup(&query)
            .await
            .map_err(|error| catalog_unavailable(SlotName::Courses, error))?;

        electives
            .iter()
            .find(|record| record.matches(&query) && record.id == candidate)
            .map(|record| record.id.clone())
            .ok_or_else(|| SlotError::CatalogMismatch {
                slot: SlotName::Courses,
                value: candidate.to_owned(),
                scope: vec![(SlotName::DegreeId, degree_id.to_owned())],
                reason: MismatchReason::NotFound,
            })
    }
}
