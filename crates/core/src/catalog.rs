use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{CatalogQuery, CatalogRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog decode error: {0}")]
    Decode(String),
}

/// Parameterized, read-only lookups against the degree/course store. Shared by
/// every session, so implementations must not keep per-call state.
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError>;
}

#[async_trait]
impl<C> CatalogConnector for Arc<C>
where
    C: CatalogConnector + ?Sized,
{
    async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
        (**self).lookup(query).await
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    records: RwLock<Vec<CatalogRecord>>,
}

impl InMemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }

    pub fn demo() -> Self {
        Self::new(demo_records())
    }

    pub fn insert(&self, record: CatalogRecord) {
        match self.records.write() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogConnector for InMemoryCatalog {
    async fn lookup(&self, query: &CatalogQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
        let records = match self.records.read() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(records.iter().filter(|record| record.matches(query)).cloned().collect())
    }
}

/// Demo catalog shared by the seed command and the test suites.
pub fn demo_records() -> Vec<CatalogRecord> {
    vec![
        CatalogRecord::degree("101", "Ingegneria Civile", "Enginering", "Bachelor's Degree"),
        CatalogRecord::degree("102", "Ingegneria Informatica", "Enginering", "Master's Degree"),
        CatalogRecord::degree("104", "Informatica", "Computer Science", "Bachelor's Degree"),
        CatalogRecord::degree(
            "110",
            "Medicina e Chirurgia",
            "Medicine",
            "Single-Cycle Master's Degree",
        ),
        CatalogRecord::degree("120", "Economia Aziendale", "Economics", "Bachelor's Degree"),
        CatalogRecord::degree("130", "Giurisprudenza", "Law", "Single-Cycle Master's Degree"),
        CatalogRecord::course("103", "Fisica Tecnica", "101", false),
        CatalogRecord::course("105", "Geologia Applicata", "101", false),
        CatalogRecord::course("106", "Topografia", "101", false),
        CatalogRecord::course("107", "Analisi Matematica I", "101", true),
        CatalogRecord::course("108", "Scienza delle Costruzioni", "101", true),
        CatalogRecord::course("201", "Machine Learning", "102", false),
        CatalogRecord::course("202", "Sistemi Distribuiti", "102", false),
        CatalogRecord::course("203", "Sicurezza Informatica", "102", true),
        CatalogRecord::course("301", "Basi di Dati", "104", false),
        CatalogRecord::course("302", "Reti di Calcolatori", "104", false),
        CatalogRecord::course("303", "Programmazione", "104", true),
        CatalogRecord::course("401", "Anatomia Umana", "110", true),
        CatalogRecord::course("402", "Medicina dello Sport", "110", false),
        CatalogRecord::course("403", "Bioetica", "110", false),
        CatalogRecord::course("501", "Marketing", "120", false),
        CatalogRecord::course("502", "Finanza Aziendale", "120", false),
        CatalogRecord::course("503", "Economia Politica", "120", true),
        CatalogRecord::course("601", "Diritto Privato", "130", true),
        CatalogRecord::course("602", "Diritto Internazionale", "130", false),
        CatalogRecord::course("603", "Criminologia", "130", false),
    ]
}

#[cfg(test)]
mod tests {
    use super::{CatalogConnector, InMemoryCatalog};
    use crate::domain::catalog::{CatalogAttribute, CatalogQuery, CatalogRecord};

    #[tokio::test]
    async fn in_memory_catalog_applies_every_filter() {
        let catalog = InMemoryCatalog::demo();

        let electives = catalog
            .lookup(
                &CatalogQuery::courses()
                    .with(CatalogAttribute::Degree, "101")
                    .with(CatalogAttribute::Mandatory, "false"),
            )
            .await
            .expect("lookup");
        let ids = electives.iter().map(|record| record.id.as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["103", "105", "106"]);
    }

    #[tokio::test]
    async fn in_memory_catalog_returns_empty_for_unknown_scope() {
        let catalog = InMemoryCatalog::demo();
        let rows = catalog
            .lookup(&CatalogQuery::degrees().with(CatalogAttribute::Category, "Astrology"))
            .await
            .expect("lookup");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn inserted_records_become_visible() {
        let catalog = InMemoryCatalog::default();
        assert!(catalog.is_empty());

        catalog.insert(CatalogRecord::degree("900", "Design", "Architecture", "Master's Degree"));
        let rows = catalog
            .lookup(&CatalogQuery::degrees().with(CatalogAttribute::Id, "900"))
            .await
            .expect("lookup");

        assert_eq!(rows.len(), 1);
        assert_eq!(catalog.len(), 1);
    }
}
