use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use enrollment_core::audit::{
    AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink,
};
use enrollment_core::catalog::CatalogConnector;
use enrollment_core::config::AppConfig;
use enrollment_core::domain::confirmation::ConfirmationRecord;
use enrollment_core::domain::language::Language;
use enrollment_core::domain::session::Session;
use enrollment_core::domain::slot::{SlotName, SlotState};
use enrollment_core::errors::{ApplicationError, DomainError, InterfaceError, SlotError};
use enrollment_core::finalize::{EnrollmentFinalizer, FinalizeError};
use enrollment_core::flows::{
    CascadeController, Decision, EnrollmentFlow, FlowDefinition, FlowError, SubmissionOutcome,
};
use enrollment_core::messages::MessageCatalog;
use enrollment_core::notify::{DeliveryError, NotificationCollaborator};
use enrollment_core::text::clean_content;
use enrollment_core::validators::ValidatorSet;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::templates::{ConfirmationTemplates, RenderedMessage, TemplateError};

const ACTOR: &str = "conversation-runtime";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub default_language: Language,
    pub min_elective_courses: usize,
    /// Second recipient for every confirmation, if set.
    pub operator_email: Option<String>,
    pub session_idle_timeout: Duration,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_language: config.flow.default_language,
            min_elective_courses: config.flow.min_elective_courses as usize,
            operator_email: config.notification.operator_email.clone(),
            session_idle_timeout: Duration::from_secs(config.flow.session_idle_secs),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotReply {
    pub slot: Option<SlotName>,
    pub accepted: bool,
    pub state: Option<SlotState>,
    pub message: String,
    pub error_code: Option<String>,
    pub reset: Vec<SlotName>,
    pub next_slot: Option<SlotName>,
    pub next_prompt: Option<String>,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub recipient: String,
    pub delivered: bool,
    /// Notification is switched off; nothing was attempted.
    pub skipped: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinalizeReply {
    pub confirmation: ConfirmationRecord,
    pub deliveries: Vec<DeliveryReport>,
    pub message: String,
}

struct SessionEntry {
    handle: Arc<Mutex<Session>>,
    last_used: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            handle: Arc::new(Mutex::new(session)),
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) -> Arc<Mutex<Session>> {
        match self.last_used.lock() {
            Ok(mut last_used) => *last_used = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
        Arc::clone(&self.handle)
    }

    fn idle_for(&self) -> Duration {
        match self.last_used.lock() {
            Ok(last_used) => last_used.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    // Handles cloned out of the map belong to in-flight requests.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.handle) > 1
    }
}

/// Adapter between the external conversation runtime and the cascade
/// controller. Holds one session per conversation id; sessions idle longer
/// than `session_idle_timeout` are dropped whenever a new conversation starts.
pub struct EnrollmentRuntime {
    controller: CascadeController<EnrollmentFlow>,
    finalizer: EnrollmentFinalizer,
    notifier: Arc<dyn NotificationCollaborator>,
    templates: ConfirmationTemplates,
    audit: Arc<dyn AuditSink>,
    settings: RuntimeSettings,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl EnrollmentRuntime {
    pub fn new(
        catalog: Arc<dyn CatalogConnector>,
        notifier: Arc<dyn NotificationCollaborator>,
        settings: RuntimeSettings,
    ) -> Result<Self, TemplateError> {
        let controller = CascadeController::new(
            EnrollmentFlow::new(settings.min_elective_courses),
            ValidatorSet::standard(Arc::clone(&catalog)),
        );
        Ok(Self {
            controller,
            finalizer: EnrollmentFinalizer::new(catalog),
            notifier,
            templates: ConfirmationTemplates::embedded()?,
            audit: Arc::new(TracingAuditSink),
            settings,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn handle_slot(
        &self,
        conversation_id: &str,
        slot_name: &str,
        raw_value: &str,
        correlation_id: &str,
    ) -> Result<SlotReply, InterfaceError> {
        let Ok(slot) = slot_name.parse::<SlotName>() else {
            tracing::warn!(
                event_name = "slot.unknown",
                correlation_id,
                conversation_id,
                slot_name,
                "submission for a slot outside the enrollment flow"
            );
            // Unknown slots never open a session.
            let reply = match self.existing(conversation_id).await {
                Some(handle) => self.unknown_slot_reply(&*handle.lock().await, slot_name),
                None => {
                    let fresh = self.controller.start_session(self.settings.default_language);
                    self.unknown_slot_reply(&fresh, slot_name)
                }
            };
            return Ok(reply);
        };

        let handle = self.session(conversation_id).await;
        let mut session = handle.lock().await;
        let messages = MessageCatalog::new(session.language());

        let value = clean_content(raw_value);
        let audit = AuditContext::new(
            Some(session.id().clone()),
            Some(conversation_id.to_owned()),
            correlation_id,
            ACTOR,
        );
        let result = self
            .controller
            .submit_with_audit(&mut session, slot, &value, self.audit.as_ref(), &audit)
            .await;

        let violations = self.controller.invariant_violations(&session);
        if !violations.is_empty() {
            tracing::error!(
                event_name = "cascade.invariant_violated",
                correlation_id,
                conversation_id,
                violations = ?violations,
                "session violates the cascade invariant"
            );
        }

        match result {
            Ok(outcome) => {
                tracing::info!(
                    event_name = "slot.handled",
                    correlation_id,
                    conversation_id,
                    slot = %slot,
                    state = ?outcome.state,
                    reset = ?outcome.reset,
                    "slot submission handled"
                );
                Ok(self.outcome_reply(&session, &messages, outcome))
            }
            Err(FlowError::DependencyNotSatisfied { slot, missing }) => {
                tracing::error!(
                    event_name = "slot.dependency_fault",
                    correlation_id,
                    conversation_id,
                    slot = %slot,
                    missing = ?missing,
                    "conversation runtime skipped ahead of the elicitation order"
                );
                let error = SlotError::DependencyNotSatisfied { slot, missing };
                let next_slot = self.controller.next_slot(&session);
                Ok(SlotReply {
                    slot: Some(slot),
                    accepted: false,
                    state: Some(session.state(slot)),
                    message: messages.error(&error),
                    error_code: Some(error.code().to_owned()),
                    reset: Vec::new(),
                    next_slot,
                    next_prompt: next_slot.map(|next| messages.prompt(next).to_owned()),
                    complete: session.is_complete(),
                })
            }
            Err(error) => {
                tracing::error!(
                    event_name = "slot.submission_failed",
                    correlation_id,
                    conversation_id,
                    slot = %slot,
                    error = %error,
                    "slot submission failed"
                );
                Err(ApplicationError::from(DomainError::from(error)).into_interface(correlation_id))
            }
        }
    }

    pub async fn set_language(
        &self,
        conversation_id: &str,
        language: Language,
        correlation_id: &str,
    ) -> Language {
        let handle = self.session(conversation_id).await;
        let mut session = handle.lock().await;
        session.set_language(language);
        tracing::info!(
            event_name = "session.language_changed",
            correlation_id,
            conversation_id,
            language = %language,
            "conversation language updated"
        );
        session.language()
    }

    /// Drops the conversation's session. Returns whether one existed.
    pub async fn abandon(&self, conversation_id: &str, correlation_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(conversation_id);
        if let Some(entry) = &removed {
            let session = entry.handle.lock().await;
            self.audit.emit(
                AuditContext::new(
                    Some(session.id().clone()),
                    Some(conversation_id.to_owned()),
                    correlation_id,
                    ACTOR,
                )
                .event("session.abandoned", AuditCategory::System, AuditOutcome::Success),
            );
        }
        removed.is_some()
    }

    pub async fn snapshot(&self, conversation_id: &str) -> Option<Session> {
        let handle = self.existing(conversation_id).await?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Builds the confirmation, sends it to the contact (and the operator when
    /// configured) and closes the conversation. Delivery failures are reported
    /// in the reply and never discard the confirmation.
    pub async fn finalize(
        &self,
        conversation_id: &str,
        correlation_id: &str,
    ) -> Result<FinalizeReply, InterfaceError> {
        let Some(handle) = self.existing(conversation_id).await else {
            let missing = self.controller.flow().graph().order().to_vec();
            return Err(finalize_failure(FinalizeError::Incomplete { missing }, correlation_id));
        };
        let session = handle.lock().await;
        let messages = MessageCatalog::new(session.language());
        let audit = AuditContext::new(
            Some(session.id().clone()),
            Some(conversation_id.to_owned()),
            correlation_id,
            ACTOR,
        );

        let record = match self.finalizer.finalize(&session).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(
                    event_name = "enrollment.finalize_failed",
                    correlation_id,
                    conversation_id,
                    error = %error,
                    "enrollment could not be finalized"
                );
                self.audit.emit(
                    audit
                        .event(
                            "enrollment.finalize_failed",
                            AuditCategory::Finalization,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", error.to_string()),
                );
                return Err(finalize_failure(error, correlation_id));
            }
        };
        self.audit.emit(
            audit
                .event("enrollment.finalized", AuditCategory::Finalization, AuditOutcome::Success)
                .with_metadata("confirmation_id", record.confirmation_id().0.to_string())
                .with_metadata("degree_id", record.degree().id.clone()),
        );

        let rendered = self.templates.render(&record).map_err(|error| {
            template_failure(error, correlation_id)
        })?;
        let mut deliveries = vec![
            self.deliver(record.contact_email(), &rendered, &audit, correlation_id).await,
        ];
        if let Some(operator) = &self.settings.operator_email {
            let forward = self
                .templates
                .render_forward(&record, &rendered)
                .map_err(|error| template_failure(error, correlation_id))?;
            deliveries.push(self.deliver(operator, &forward, &audit, correlation_id).await);
        }

        let message = match deliveries.first() {
            Some(report) if report.delivered => messages.delivery_succeeded(record.contact_email()),
            Some(report) if report.skipped => messages.delivery_disabled().to_owned(),
            _ => messages.delivery_failed().to_owned(),
        };

        drop(session);
        let mut sessions = self.sessions.write().await;
        let current = sessions.get(conversation_id);
        if current.is_some_and(|entry| Arc::ptr_eq(&entry.handle, &handle)) {
            sessions.remove(conversation_id);
        }

        Ok(FinalizeReply { confirmation: record, deliveries, message })
    }

    async fn existing(&self, conversation_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(conversation_id).map(SessionEntry::touch)
    }

    async fn session(&self, conversation_id: &str) -> Arc<Mutex<Session>> {
        if let Some(handle) = self.existing(conversation_id).await {
            return handle;
        }
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(conversation_id) {
            return entry.touch();
        }

        let before = sessions.len();
        let idle_timeout = self.settings.session_idle_timeout;
        sessions.retain(|_, entry| entry.in_use() || entry.idle_for() < idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(
                event_name = "session.evicted",
                evicted,
                idle_timeout_secs = idle_timeout.as_secs(),
                "idle enrollment sessions dropped"
            );
        }

        let session = self.controller.start_session(self.settings.default_language);
        tracing::info!(
            event_name = "session.started",
            conversation_id,
            session_id = %session.id().0,
            language = %session.language(),
            "new enrollment session"
        );
        let entry = SessionEntry::new(session);
        let handle = Arc::clone(&entry.handle);
        sessions.insert(conversation_id.to_owned(), entry);
        handle
    }

    async fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
        audit: &AuditContext,
        correlation_id: &str,
    ) -> DeliveryReport {
        match self.notifier.deliver(recipient, &message.subject, &message.body).await {
            Ok(()) => {
                self.audit.emit(
                    audit
                        .event(
                            "notification.delivered",
                            AuditCategory::Notification,
                            AuditOutcome::Success,
                        )
                        .with_metadata("recipient", recipient),
                );
                DeliveryReport {
                    recipient: recipient.to_owned(),
                    delivered: true,
                    skipped: false,
                    error: None,
                }
            }
            Err(DeliveryError::Disabled) => {
                self.audit.emit(
                    audit
                        .event(
                            "notification.skipped",
                            AuditCategory::Notification,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("recipient", recipient),
                );
                DeliveryReport {
                    recipient: recipient.to_owned(),
                    delivered: false,
                    skipped: true,
                    error: Some(DeliveryError::Disabled.to_string()),
                }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "notification.failed",
                    correlation_id,
                    recipient,
                    error = %error,
                    "confirmation delivery failed"
                );
                self.audit.emit(
                    audit
                        .event(
                            "notification.failed",
                            AuditCategory::Notification,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("recipient", recipient)
                        .with_metadata("error", error.to_string()),
                );
                DeliveryReport {
                    recipient: recipient.to_owned(),
                    delivered: false,
                    skipped: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    fn outcome_reply(
        &self,
        session: &Session,
        messages: &MessageCatalog,
        outcome: SubmissionOutcome,
    ) -> SlotReply {
        let mut parts = Vec::new();
        match &outcome.decision {
            Decision::Accepted { value } => {
                parts.push(messages.accepted(outcome.slot, &value.to_string()));
            }
            Decision::Incomplete { value, error } => {
                parts.push(messages.accepted(outcome.slot, &value.to_string()));
                parts.push(messages.error(error));
            }
            Decision::Rejected { error } | Decision::Retry { error } => {
                parts.push(messages.error(error));
            }
        }
        parts.extend(messages.reset_notice(&outcome.reset));

        let complete = session.is_complete();
        let next_slot = self.controller.next_slot(session);
        if complete {
            parts.push(messages.complete().to_owned());
        } else if let (Decision::Accepted { .. }, Some(next)) = (&outcome.decision, next_slot) {
            parts.push(messages.prompt(next).to_owned());
        }

        SlotReply {
            slot: Some(outcome.slot),
            accepted: outcome.decision.is_accepted(),
            state: Some(outcome.state),
            message: parts.join(" "),
            error_code: outcome.decision.error().map(|error| error.code().to_owned()),
            reset: outcome.reset,
            next_slot,
            next_prompt: next_slot.map(|next| messages.prompt(next).to_owned()),
            complete,
        }
    }

    fn unknown_slot_reply(&self, session: &Session, slot_name: &str) -> SlotReply {
        let messages = MessageCatalog::new(session.language());
        let next_slot = self.controller.next_slot(session);
        SlotReply {
            slot: None,
            accepted: false,
            state: None,
            message: messages.unknown_slot(slot_name),
            error_code: Some("unknown_slot".to_owned()),
            reset: Vec::new(),
            next_slot,
            next_prompt: next_slot.map(|next| messages.prompt(next).to_owned()),
            complete: session.is_complete(),
        }
    }
}

fn finalize_failure(error: FinalizeError, correlation_id: &str) -> InterfaceError {
    ApplicationError::from(DomainError::from(error)).into_interface(correlation_id)
}

fn template_failure(error: TemplateError, correlation_id: &str) -> InterfaceError {
    tracing::error!(
        event_name = "notification.render_failed",
        correlation_id,
        error = %error,
        "confirmation template could not be rendered"
    );
    InterfaceError::Internal { message: error.to_string(), correlation_id: correlation_id.to_owned() }
}
