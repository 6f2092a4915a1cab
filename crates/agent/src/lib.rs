//! Conversation-runtime adapter for the enrollment flow.
//!
//! The external conversation runtime sends `(slot name, raw value)` events per
//! conversation; this crate keeps one session per conversation, routes the
//! events through the cascade controller, renders bilingual replies and hands
//! completed enrollments to a notification collaborator.
//!
//! The runtime never decides what is valid. Validation, cascade resets and
//! finalization are deterministic decisions made by `enrollment-core`.

pub mod notify;
pub mod runtime;
pub mod templates;

pub use notify::{InMemoryNotifier, LogNotifier, OutboundMessage, WebhookNotifier};
pub use runtime::{DeliveryReport, EnrollmentRuntime, FinalizeReply, RuntimeSettings, SlotReply};
pub use templates::{ConfirmationTemplates, RenderedMessage, TemplateError};
