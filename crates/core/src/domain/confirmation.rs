use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::language::Language;
use crate::domain::session::SessionId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmationId(pub Uuid);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDegree {
    pub id: String,
    pub name: String,
    pub degree_type: String,
    pub category: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCourse {
    pub id: String,
    pub name: String,
}

/// Denormalized enrollment summary. Built once by the finalizer and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    confirmation_id: ConfirmationId,
    session_id: SessionId,
    language: Language,
    field_of_study: String,
    degree: ResolvedDegree,
    electives: Vec<ResolvedCourse>,
    mandatory_courses: Vec<ResolvedCourse>,
    contact_email: String,
    confirmed_at: DateTime<Utc>,
}

impl ConfirmationRecord {
    pub(crate) fn new(
        session_id: SessionId,
        language: Language,
        field_of_study: String,
        degree: ResolvedDegree,
        electives: Vec<ResolvedCourse>,
        mandatory_courses: Vec<ResolvedCourse>,
        contact_email: String,
    ) -> Self {
        Self {
            confirmation_id: ConfirmationId(Uuid::new_v4()),
            session_id,
            language,
            field_of_study,
            degree,
            electives,
            mandatory_courses,
            contact_email,
            confirmed_at: Utc::now(),
        }
    }

    pub fn confirmation_id(&self) -> &ConfirmationId {
        &self.confirmation_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn field_of_study(&self) -> &str {
        &self.field_of_study
    }

    pub fn degree(&self) -> &ResolvedDegree {
        &self.degree
    }

    pub fn electives(&self) -> &[ResolvedCourse] {
        &self.electives
    }

    pub fn mandatory_courses(&self) -> &[ResolvedCourse] {
        &self.mandatory_courses
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }
}
