use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Degree,
    Course,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogAttribute {
    Id,
    Category,
    DegreeType,
    /// Owning degree of a course record.
    Degree,
    Mandatory,
}

impl CatalogAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Category => "category",
            Self::DegreeType => "degree_type",
            Self::Degree => "degree_id",
            Self::Mandatory => "mandatory",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub kind: RecordKind,
    pub filters: BTreeMap<CatalogAttribute, String>,
}

impl CatalogQuery {
    pub fn degrees() -> Self {
        Self { kind: RecordKind::Degree, filters: BTreeMap::new() }
    }

    pub fn courses() -> Self {
        Self { kind: RecordKind::Course, filters: BTreeMap::new() }
    }

    pub fn with(mut self, attribute: CatalogAttribute, value: impl Into<String>) -> Self {
        self.filters.insert(attribute, value.into());
        self
    }

    pub fn filter(&self, attribute: CatalogAttribute) -> Option<&str> {
        self.filters.get(&attribute).map(String::as_str)
    }
}

/// Read-only row of the external degree/course store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub kind: RecordKind,
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub degree_type: Option<String>,
    pub degree_id: Option<String>,
    pub mandatory: bool,
}

impl CatalogRecord {
    pub fn degree(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        degree_type: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Degree,
            id: id.into(),
            name: name.into(),
            category: Some(category.into()),
            degree_type: Some(degree_type.into()),
            degree_id: None,
            mandatory: false,
        }
    }

    pub fn course(
        id: impl Into<String>,
        name: impl Into<String>,
        degree_id: impl Into<String>,
        mandatory: bool,
    ) -> Self {
        Self {
            kind: RecordKind::Course,
            id: id.into(),
            name: name.into(),
            category: None,
            degree_type: None,
            degree_id: Some(degree_id.into()),
            mandatory,
        }
    }

    /// Value of `attribute` rendered the way query filters carry it.
    pub fn attribute(&self, attribute: CatalogAttribute) -> Option<String> {
        match attribute {
            CatalogAttribute::Id => Some(self.id.clone()),
            CatalogAttribute::Category => self.category.clone(),
            CatalogAttribute::DegreeType => self.degree_type.clone(),
            CatalogAttribute::Degree => self.degree_id.clone(),
            CatalogAttribute::Mandatory => Some(self.mandatory.to_string()),
        }
    }

    pub fn matches(&self, query: &CatalogQuery) -> bool {
        self.kind == query.kind
            && query.filters.iter().all(|(attribute, expected)| {
                self.attribute(*attribute).as_deref() == Some(expected.as_str())
            })
    }
}
