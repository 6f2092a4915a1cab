//! Per-slot validation decisions.
//!
//! A validator only decides: it never mutates the session. The cascade
//! controller applies the decision and owns every state transition.

mod course;
mod degree;
mod email;
mod vocabulary;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{CatalogConnector, CatalogError};
use crate::domain::session::Session;
use crate::domain::slot::SlotName;
use crate::errors::SlotError;

pub use course::CourseValidator;
pub use degree::DegreeIdValidator;
pub use email::{is_email_shaped, EmailValidator};
pub use vocabulary::VocabularyValidator;

#[async_trait]
pub trait SlotValidator: Send + Sync {
    fn slot(&self) -> SlotName;

    /// Returns the canonical value for `raw`, or the reason it was not accepted.
    async fn validate(&self, raw: &str, session: &Session) -> Result<String, SlotError>;
}

#[derive(Default)]
pub struct ValidatorSet {
    validators: BTreeMap<SlotName, Box<dyn SlotValidator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validators for every enrollment slot, sharing one catalog connector.
    pub fn standard(catalog: Arc<dyn CatalogConnector>) -> Self {
        let mut set = Self::new();
        set.register(VocabularyValidator::field_of_study());
        set.register(VocabularyValidator::degree_type());
        set.register(DegreeIdValidator::new(catalog.clone()));
        set.register(CourseValidator::new(catalog));
        set.register(EmailValidator);
        set
    }

    pub fn register<V>(&mut self, validator: V)
    where
        V: SlotValidator + 'static,
    {
        self.validators.insert(validator.slot(), Box::new(validator));
    }

    pub fn get(&self, slot: SlotName) -> Option<&dyn SlotValidator> {
        self.validators.get(&slot).map(Box::as_ref)
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotName> + '_ {
        self.validators.keys().copied()
    }
}

/// Canonical values of `upstream`, or the dependency fault naming what is missing.
pub(crate) fn require_upstream<'a>(
    slot: SlotName,
    upstream: &[SlotName],
    session: &'a Session,
) -> Result<Vec<&'a str>, SlotError> {
    let missing: Vec<SlotName> =
        upstream.iter().copied().filter(|name| session.valid_text(*name).is_none()).collect();
    if !missing.is_empty() {
        return Err(SlotError::DependencyNotSatisfied { slot, missing });
    }
    Ok(upstream.iter().filter_map(|name| session.valid_text(*name)).collect())
}

pub(crate) fn catalog_unavailable(slot: SlotName, error: CatalogError) -> SlotError {
    tracing::warn!(
        event_name = "catalog.lookup_failed",
        slot = %slot,
        error = %error,
        "catalog lookup failed during slot validation"
    );
    SlotError::CatalogUnavailable { slot, reason: error.to_string() }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::catalog::{CatalogConnector, CatalogError};
    use crate::domain::catalog::{CatalogQuery, CatalogRecord};

    /// Connector that fails every lookup as an unreachable store would.
    pub struct UnavailableCatalog;

    #[async_trait]
    impl CatalogConnector for UnavailableCatalog {
        async fn lookup(&self, _query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ValidatorSet;
    use crate::catalog::InMemoryCatalog;
    use crate::domain::slot::SlotName;

    #[test]
    fn standard_set_covers_every_enrollment_slot() {
        let set = ValidatorSet::standard(Arc::new(InMemoryCatalog::demo()));
        assert_eq!(set.slots().collect::<Vec<_>>(), SlotName::ALL.to_vec());
        assert_eq!(set.get(SlotName::Courses).map(|validator| validator.slot()), Some(SlotName::Courses));
    }
}
