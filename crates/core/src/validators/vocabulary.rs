use async_trait::async_trait;

use crate::aliases::{degree_type_table, field_of_study_table, AliasTable};
use crate::domain::session::Session;
use crate::domain::slot::SlotName;
use crate::errors::SlotError;
use crate::validators::SlotValidator;

/// Validates a slot against a fixed alias vocabulary; no catalog round-trip.
pub struct VocabularyValidator {
    slot: SlotName,
    table: AliasTable,
}

impl VocabularyValidator {
    pub fn new(slot: SlotName, table: AliasTable) -> Self {
        Self { slot, table }
    }

    pub fn field_of_study() -> Self {
        Self::new(SlotName::FieldOfStudy, field_of_study_table())
    }

    pub fn degree_type() -> Self {
        Self::new(SlotName::DegreeType, degree_type_table())
    }
}

#[async_trait]
impl SlotValidator for VocabularyValidator {
    fn slot(&self) -> SlotName {
        self.slot
    }

    async fn validate(&self, raw: &str, _session: &Session) -> Result<String, SlotError> {
        self.table.normalize(raw).map(str::to_owned).ok_or_else(|| {
            SlotError::NormalizationFailure { slot: self.slot, value: raw.trim().to_owned() }
        })
    }
}
