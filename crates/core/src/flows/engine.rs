use std::collections::BTreeMap;

use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::language::Language;
use crate::domain::session::Session;
use crate::domain::slot::{SlotName, SlotState, SlotValue};
use crate::errors::SlotError;
use crate::flows::graph::{DependencyGraph, InvariantViolation};
use crate::flows::states::{
    transition, Decision, SlotEvent, SlotTransitionError, SubmissionOutcome,
};
use crate::validators::ValidatorSet;

pub const DEFAULT_MIN_ELECTIVE_COURSES: usize = 2;

pub trait FlowDefinition: Send + Sync {
    fn graph(&self) -> &DependencyGraph;

    /// Minimum distinct selections for group slots; `None` for single-value slots.
    fn minimum_selection(&self, slot: SlotName) -> Option<usize>;
}

#[derive(Clone, Debug)]
pub struct EnrollmentFlow {
    graph: DependencyGraph,
    min_elective_courses: usize,
}

impl EnrollmentFlow {
    pub fn new(min_elective_courses: usize) -> Self {
        Self { graph: DependencyGraph::enrollment(), min_elective_courses: min_elective_courses.max(1) }
    }

    pub fn standard() -> Self {
        Self::new(DEFAULT_MIN_ELECTIVE_COURSES)
    }

    pub fn min_elective_courses(&self) -> usize {
        self.min_elective_courses
    }
}

impl Default for EnrollmentFlow {
    fn default() -> Self {
        Self::standard()
    }
}

impl FlowDefinition for EnrollmentFlow {
    fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn minimum_selection(&self, slot: SlotName) -> Option<usize> {
        (slot == SlotName::Courses).then_some(self.min_elective_courses)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("{slot} cannot be validated before {missing:?}")]
    DependencyNotSatisfied { slot: SlotName, missing: Vec<SlotName> },
    #[error("slot {0} is not part of this flow")]
    UnknownSlot(SlotName),
    #[error("no validator registered for slot {0}")]
    MissingValidator(SlotName),
    #[error(transparent)]
    Transition(#[from] SlotTransitionError),
}

/// Routes slot submissions to validators and keeps the cascade invariant:
/// a slot is never valid while one of its upstream slots is not.
pub struct CascadeController<F> {
    flow: F,
    validators: ValidatorSet,
}

impl<F> CascadeController<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F, validators: ValidatorSet) -> Self {
        Self { flow, validators }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn start_session(&self, language: Language) -> Session {
        Session::new(self.flow.graph().order().to_vec(), language)
    }

    /// Upstream slots of `slot` that are not valid yet.
    pub fn missing_dependencies(&self, session: &Session, slot: SlotName) -> Vec<SlotName> {
        self.flow
            .graph()
            .upstream(slot)
            .into_iter()
            .filter(|upstream| !session.is_valid(*upstream))
            .collect()
    }

    /// First slot in elicitation order that still needs a value.
    pub fn next_slot(&self, session: &Session) -> Option<SlotName> {
        self.flow.graph().order().iter().copied().find(|slot| !session.is_valid(*slot))
    }

    pub fn invariant_violations(&self, session: &Session) -> Vec<InvariantViolation> {
        self.flow.graph().violations(session)
    }

    pub async fn submit(
        &self,
        session: &mut Session,
        slot: SlotName,
        raw: &str,
    ) -> Result<SubmissionOutcome, FlowError> {
        if !self.flow.graph().contains(slot) || session.slot(slot).is_none() {
            return Err(FlowError::UnknownSlot(slot));
        }

        let missing = self.missing_dependencies(session, slot);
        if !missing.is_empty() {
            tracing::error!(
                event_name = "slot.dependency_not_satisfied",
                slot = %slot,
                missing = ?missing,
                "slot submitted before its upstream slots were valid"
            );
            return Err(FlowError::DependencyNotSatisfied { slot, missing });
        }

        let validator = self.validators.get(slot).ok_or(FlowError::MissingValidator(slot))?;
        match validator.validate(raw, session).await {
            Ok(canonical) => self.accept(session, slot, raw, canonical),
            Err(SlotError::DependencyNotSatisfied { slot, missing }) => {
                Err(FlowError::DependencyNotSatisfied { slot, missing })
            }
            Err(error) if error.is_transient() => {
                tracing::warn!(
                    event_name = "slot.retry",
                    slot = %slot,
                    error = %error,
                    "slot left untouched after transient catalog failure"
                );
                Ok(SubmissionOutcome {
                    slot,
                    decision: Decision::Retry { error },
                    state: session.state(slot),
                    reset: Vec::new(),
                })
            }
            Err(error) => self.reject(session, slot, raw, error),
        }
    }

    pub async fn submit_with_audit<S>(
        &self,
        session: &mut Session,
        slot: SlotName,
        raw: &str,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<SubmissionOutcome, FlowError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.submit(session, slot, raw).await;
        match &result {
            Ok(outcome) => {
                let (event_type, category, status) = match &outcome.decision {
                    Decision::Accepted { .. } => {
                        ("slot.accepted", AuditCategory::Slot, AuditOutcome::Success)
                    }
                    Decision::Incomplete { .. } => {
                        ("slot.selection_incomplete", AuditCategory::Slot, AuditOutcome::Success)
                    }
                    Decision::Rejected { .. } => {
                        ("slot.rejected", AuditCategory::Slot, AuditOutcome::Rejected)
                    }
                    Decision::Retry { .. } => {
                        ("catalog.unavailable", AuditCategory::Catalog, AuditOutcome::Failed)
                    }
                };
                let mut event = audit
                    .event(event_type, category, status)
                    .with_metadata("slot", slot.as_str())
                    .with_metadata("state", format!("{:?}", outcome.state));
                if let Some(error) = outcome.decision.error() {
                    event = event.with_metadata("error_code", error.code());
                }
                sink.emit(event);

                if !outcome.reset.is_empty() {
                    sink.emit(
                        audit
                            .event("cascade.reset", AuditCategory::Cascade, AuditOutcome::Success)
                            .with_metadata("trigger", slot.as_str())
                            .with_metadata("reset", format!("{:?}", outcome.reset)),
                    );
                }
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event("slot.submission_failed", AuditCategory::Slot, AuditOutcome::Failed)
                        .with_metadata("slot", slot.as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Forcibly clears `slot` and every slot downstream of it. Returns the slots
    /// that actually held something.
    pub fn reset(&self, session: &mut Session, slot: SlotName) -> Result<Vec<SlotName>, FlowError> {
        let target = session.slot_mut(slot).ok_or(FlowError::UnknownSlot(slot))?;
        let mut reset = Vec::new();
        if !target.is_pristine() {
            transition(target.state(), SlotEvent::Reset)?;
            target.clear();
            reset.push(slot);
        }
        reset.extend(self.cascade(session, slot)?);
        tracing::info!(
            event_name = "cascade.forced_reset",
            slot = %slot,
            reset = ?reset,
            "slot reset on request"
        );
        Ok(reset)
    }

    fn accept(
        &self,
        session: &mut Session,
        slot: SlotName,
        raw: &str,
        canonical: String,
    ) -> Result<SubmissionOutcome, FlowError> {
        let previous = session.value(slot).cloned();
        let snapshot: BTreeMap<SlotName, SlotValue> = self
            .flow
            .graph()
            .upstream(slot)
            .into_iter()
            .filter_map(|upstream| session.value(upstream).cloned().map(|value| (upstream, value)))
            .collect();

        let (value, event, decision) = match self.flow.minimum_selection(slot) {
            Some(required) => {
                let mut selection =
                    previous.as_ref().map(|value| value.as_selection().to_vec()).unwrap_or_default();
                if !selection.contains(&canonical) {
                    selection.push(canonical);
                }
                let selected = selection.len();
                let value = SlotValue::Selection(selection);
                if selected >= required {
                    (value.clone(), SlotEvent::ValueAccepted, Decision::Accepted { value })
                } else {
                    let error = SlotError::GroupCardinalityUnmet { slot, selected, required };
                    (
                        value.clone(),
                        SlotEvent::SelectionIncomplete,
                        Decision::Incomplete { value, error },
                    )
                }
            }
            None => {
                let value = SlotValue::Text(canonical);
                (value.clone(), SlotEvent::ValueAccepted, Decision::Accepted { value })
            }
        };

        let target = session.slot_mut(slot).ok_or(FlowError::UnknownSlot(slot))?;
        let mut state = target.state();
        if state == SlotState::Invalid {
            state = transition(state, SlotEvent::Resubmitted)?.to;
        }
        let state = transition(state, event)?.to;
        let changed = previous.as_ref() != Some(&value);
        target.record(raw, Some(value), state, snapshot);

        let reset = if changed { self.cascade(session, slot)? } else { Vec::new() };
        tracing::info!(
            event_name = "slot.accepted",
            slot = %slot,
            state = ?state,
            changed,
            reset = ?reset,
            "slot value accepted"
        );

        Ok(SubmissionOutcome { slot, decision, state, reset })
    }

    fn reject(
        &self,
        session: &mut Session,
        slot: SlotName,
        raw: &str,
        error: SlotError,
    ) -> Result<SubmissionOutcome, FlowError> {
        let target = session.slot_mut(slot).ok_or(FlowError::UnknownSlot(slot))?;

        // A slot already holding accepted values keeps them.
        if target.value().is_none() {
            let mut state = target.state();
            if state == SlotState::Invalid {
                state = transition(state, SlotEvent::Resubmitted)?.to;
            }
            let state = transition(state, SlotEvent::ValueRejected)?.to;
            target.record_raw(raw, state);
        }

        let state = target.state();
        tracing::info!(
            event_name = "slot.rejected",
            slot = %slot,
            state = ?state,
            error_code = error.code(),
            "slot value rejected"
        );
        Ok(SubmissionOutcome { slot, decision: Decision::Rejected { error }, state, reset: Vec::new() })
    }

    fn cascade(&self, session: &mut Session, slot: SlotName) -> Result<Vec<SlotName>, FlowError> {
        let mut reset = Vec::new();
        for downstream in self.flow.graph().downstream_closure(slot) {
            let Some(target) = session.slot_mut(downstream) else {
                continue;
            };
            if target.is_pristine() {
                continue;
            }
            transition(target.state(), SlotEvent::UpstreamChanged)?;
            target.clear();
            reset.push(downstream);
        }
        if !reset.is_empty() {
            tracing::info!(
                event_name = "cascade.reset",
                trigger = %slot,
                reset = ?reset,
                "downstream slots reset after upstream change"
            );
        }
        Ok(reset)
    }
}
