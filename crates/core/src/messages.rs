//! Bilingual user-facing messages, keyed by the session language flag.

use crate::domain::language::Language;
use crate::domain::slot::SlotName;
use crate::errors::{MismatchReason, SlotError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageCatalog {
    language: Language,
}

impl MessageCatalog {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn slot_label(&self, slot: SlotName) -> &'static str {
        match (self.language, slot) {
            (Language::Italian, SlotName::FieldOfStudy) => "area di studio",
            (Language::Italian, SlotName::DegreeType) => "tipo di laurea",
            (Language::Italian, SlotName::DegreeId) => "corso di laurea",
            (Language::Italian, SlotName::Courses) => "esami a scelta",
            (Language::Italian, SlotName::Email) => "indirizzo email",
            (Language::English, SlotName::FieldOfStudy) => "field of study",
            (Language::English, SlotName::DegreeType) => "degree type",
            (Language::English, SlotName::DegreeId) => "degree programme",
            (Language::English, SlotName::Courses) => "elective courses",
            (Language::English, SlotName::Email) => "email address",
        }
    }

    pub fn prompt(&self, slot: SlotName) -> &'static str {
        match (self.language, slot) {
            (Language::Italian, SlotName::FieldOfStudy) => {
                "In quale area vorresti studiare? (es. Ingegneria, Medicina, Economia)"
            }
            (Language::Italian, SlotName::DegreeType) => {
                "Che tipo di laurea ti interessa: triennale, magistrale o a ciclo unico?"
            }
            (Language::Italian, SlotName::DegreeId) => {
                "Indica il codice del corso di laurea che vuoi frequentare."
            }
            (Language::Italian, SlotName::Courses) => {
                "Indica il codice di un esame a scelta del tuo corso di laurea."
            }
            (Language::Italian, SlotName::Email) => {
                "A quale indirizzo email possiamo inviarti la conferma?"
            }
            (Language::English, SlotName::FieldOfStudy) => {
                "Which field would you like to study? (e.g. Engineering, Medicine, Economics)"
            }
            (Language::English, SlotName::DegreeType) => {
                "Which degree type are you interested in: bachelor's, master's or single-cycle?"
            }
            (Language::English, SlotName::DegreeId) => {
                "Please give the code of the degree programme you want to attend."
            }
            (Language::English, SlotName::Courses) => {
                "Please give the code of an elective course of your degree programme."
            }
            (Language::English, SlotName::Email) => {
                "Which email address should we send the confirmation to?"
            }
        }
    }

    pub fn accepted(&self, slot: SlotName, value: &str) -> String {
        match self.language {
            Language::Italian => format!("Perfetto, {}: {value}.", self.slot_label(slot)),
            Language::English => format!("Great, {}: {value}.", self.slot_label(slot)),
        }
    }

    /// User-facing rendering of a slot failure. Dependency faults render as a
    /// request for the first missing slot, never as the raw error.
    pub fn error(&self, error: &SlotError) -> String {
        match (self.language, error) {
            (Language::Italian, SlotError::NormalizationFailure { slot, value }) => format!(
                "Non ho riconosciuto \"{value}\" come {}. {}",
                self.slot_label(*slot),
                self.prompt(*slot)
            ),
            (Language::English, SlotError::NormalizationFailure { slot, value }) => format!(
                "I did not recognise \"{value}\" as a {}. {}",
                self.slot_label(*slot),
                self.prompt(*slot)
            ),
            (Language::Italian, SlotError::CatalogMismatch { slot, value, scope, reason }) => {
                let found = match reason {
                    MismatchReason::NotFound => "non risulta disponibile",
                    MismatchReason::Ambiguous => "corrisponde a più voci del catalogo",
                };
                format!(
                    "Il valore \"{value}\" per {} {found} per {}. {}",
                    self.slot_label(*slot),
                    self.scope(scope),
                    self.prompt(*slot)
                )
            }
            (Language::English, SlotError::CatalogMismatch { slot, value, scope, reason }) => {
                let found = match reason {
                    MismatchReason::NotFound => "is not available",
                    MismatchReason::Ambiguous => "matches more than one catalog entry",
                };
                format!(
                    "The {} \"{value}\" {found} for {}. {}",
                    self.slot_label(*slot),
                    self.scope(scope),
                    self.prompt(*slot)
                )
            }
            (Language::Italian, SlotError::CatalogUnavailable { slot, .. }) => format!(
                "Il catalogo dei corsi non è raggiungibile in questo momento. Riprova a indicare {}.",
                self.slot_label(*slot)
            ),
            (Language::English, SlotError::CatalogUnavailable { slot, .. }) => format!(
                "The course catalogue is unavailable right now. Please send your {} again.",
                self.slot_label(*slot)
            ),
            (_, SlotError::DependencyNotSatisfied { slot, missing }) => {
                self.prompt(missing.first().copied().unwrap_or(*slot)).to_owned()
            }
            (Language::Italian, SlotError::GroupCardinalityUnmet { slot, selected, required }) => {
                format!(
                    "Hai scelto {selected} di {required} {}. {}",
                    self.slot_label(*slot),
                    self.prompt(*slot)
                )
            }
            (Language::English, SlotError::GroupCardinalityUnmet { slot, selected, required }) => {
                format!(
                    "You have chosen {selected} of {required} {}. {}",
                    self.slot_label(*slot),
                    self.prompt(*slot)
                )
            }
        }
    }

    pub fn reset_notice(&self, reset: &[SlotName]) -> Option<String> {
        if reset.is_empty() {
            return None;
        }
        let labels: Vec<_> = reset.iter().map(|slot| self.slot_label(*slot)).collect();
        Some(match self.language {
            Language::Italian => {
                format!("Ho azzerato le scelte che dipendevano da questa: {}.", labels.join(", "))
            }
            Language::English => {
                format!("I cleared the choices that depended on this one: {}.", labels.join(", "))
            }
        })
    }

    pub fn unknown_slot(&self, name: &str) -> String {
        match self.language {
            Language::Italian => format!("Il campo \"{name}\" non fa parte dell'iscrizione."),
            Language::English => format!("\"{name}\" is not part of the enrollment form."),
        }
    }

    pub fn complete(&self) -> &'static str {
        match self.language {
            Language::Italian => "Ho tutte le informazioni. Posso confermare l'iscrizione.",
            Language::English => "I have everything I need. I can confirm the enrollment.",
        }
    }

    pub fn incomplete(&self, missing: &[SlotName]) -> String {
        let labels: Vec<_> = missing.iter().map(|slot| self.slot_label(*slot)).collect();
        match self.language {
            Language::Italian => format!("Mancano ancora: {}.", labels.join(", ")),
            Language::English => format!("Still missing: {}.", labels.join(", ")),
        }
    }

    pub fn delivery_succeeded(&self, recipient: &str) -> String {
        match self.language {
            Language::Italian => format!("Iscrizione confermata. Riepilogo inviato a {recipient}."),
            Language::English => format!("Enrollment confirmed. Summary sent to {recipient}."),
        }
    }

    pub fn delivery_failed(&self) -> &'static str {
        match self.language {
            Language::Italian => {
                "Iscrizione confermata, ma non sono riuscito a inviare l'email di riepilogo."
            }
            Language::English => {
                "Enrollment confirmed, but the summary email could not be sent."
            }
        }
    }

    pub fn delivery_disabled(&self) -> &'static str {
        match self.language {
            Language::Italian => {
                "Iscrizione confermata. L'invio dell'email di riepilogo non è attivo."
            }
            Language::English => "Enrollment confirmed. Summary emails are not enabled.",
        }
    }

    pub fn internal_error(&self) -> &'static str {
        match self.language {
            Language::Italian => "Si è verificato un errore interno. Riprova tra poco.",
            Language::English => "An internal error occurred. Please try again shortly.",
        }
    }

    fn scope(&self, scope: &[(SlotName, String)]) -> String {
        scope
            .iter()
            .map(|(slot, value)| format!("{} \"{value}\"", self.slot_label(*slot)))
            .collect::<Vec<_>>()
            .join(match self.language {
                Language::Italian => " e ",
                Language::English => " and ",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::MessageCatalog;
    use crate::domain::language::Language;
    use crate::domain::slot::SlotName;
    use crate::errors::{MismatchReason, SlotError};

    #[test]
    fn mismatch_restates_scope_in_both_languages() {
        let error = SlotError::CatalogMismatch {
            slot: SlotName::DegreeId,
            value: "101".to_owned(),
            scope: vec![
                (SlotName::FieldOfStudy, "Enginering".to_owned()),
                (SlotName::DegreeType, "Master's Degree".to_owned()),
            ],
            reason: MismatchReason::NotFound,
        };

        let italian = MessageCatalog::new(Language::Italian).error(&error);
        let english = MessageCatalog::new(Language::English).error(&error);

        assert!(italian.contains("area di studio \"Enginering\" e tipo di laurea"));
        assert!(english.contains("field of study \"Enginering\" and degree type"));
    }

    #[test]
    fn dependency_fault_renders_as_prompt_for_missing_slot() {
        let messages = MessageCatalog::new(Language::English);
        let error = SlotError::DependencyNotSatisfied {
            slot: SlotName::Courses,
            missing: vec![SlotName::DegreeId],
        };

        assert_eq!(messages.error(&error), messages.prompt(SlotName::DegreeId));
    }

    #[test]
    fn reset_notice_only_when_something_was_reset() {
        let messages = MessageCatalog::new(Language::Italian);
        assert_eq!(messages.reset_notice(&[]), None);
        assert!(messages
            .reset_notice(&[SlotName::DegreeId, SlotName::Courses])
            .is_some_and(|notice| notice.contains("corso di laurea, esami a scelta")));
    }
}
