pub mod aliases;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod finalize;
pub mod flows;
pub mod messages;
pub mod notify;
pub mod text;
pub mod validators;

pub use aliases::{AliasEntry, AliasTable};
pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use catalog::{CatalogConnector, CatalogError, InMemoryCatalog};
pub use domain::catalog::{CatalogAttribute, CatalogQuery, CatalogRecord, RecordKind};
pub use domain::confirmation::{ConfirmationRecord, ResolvedCourse, ResolvedDegree};
pub use domain::language::Language;
pub use domain::session::{Session, SessionId};
pub use domain::slot::{Slot, SlotName, SlotState, SlotValue};
pub use errors::{ApplicationError, DomainError, InterfaceError, MismatchReason, SlotError};
pub use finalize::{EnrollmentFinalizer, FinalizeError};
pub use flows::{CascadeController, Decision, EnrollmentFlow, FlowError, SubmissionOutcome};
pub use messages::MessageCatalog;
pub use notify::{DeliveryError, NotificationCollaborator};
pub use validators::{SlotValidator, ValidatorSet};
