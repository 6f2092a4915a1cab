use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::slot::SlotName;
use crate::finalize::FinalizeError;
use crate::flows::{FlowError, GraphError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    NotFound,
    Ambiguous,
}

/// Outcome of a single failed slot validation.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SlotError {
    #[error("value `{value}` is not recognized for {slot}")]
    NormalizationFailure { slot: SlotName, value: String },
    #[error("value `{value}` for {slot} does not exist within {scope:?} ({reason:?})")]
    CatalogMismatch {
        slot: SlotName,
        value: String,
        scope: Vec<(SlotName, String)>,
        reason: MismatchReason,
    },
    #[error("catalog unavailable while validating {slot}: {reason}")]
    CatalogUnavailable { slot: SlotName, reason: String },
    #[error("{slot} requires {missing:?} to be valid first")]
    DependencyNotSatisfied { slot: SlotName, missing: Vec<SlotName> },
    #[error("{slot} needs at least {required} distinct selections, has {selected}")]
    GroupCardinalityUnmet { slot: SlotName, selected: usize, required: usize },
}

impl SlotError {
    pub fn slot(&self) -> SlotName {
        match self {
            Self::NormalizationFailure { slot, .. }
            | Self::CatalogMismatch { slot, .. }
            | Self::CatalogUnavailable { slot, .. }
            | Self::DependencyNotSatisfied { slot, .. }
            | Self::GroupCardinalityUnmet { slot, .. } => *slot,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NormalizationFailure { .. } => "normalization_failure",
            Self::CatalogMismatch { .. } => "catalog_mismatch",
            Self::CatalogUnavailable { .. } => "catalog_unavailable",
            Self::DependencyNotSatisfied { .. } => "dependency_not_satisfied",
            Self::GroupCardinalityUnmet { .. } => "group_cardinality_unmet",
        }
    }

    /// Transient failures leave the slot exactly as it was.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CatalogUnavailable { .. })
    }

    /// Flow-ordering faults are internal and never rendered verbatim to users.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::DependencyNotSatisfied { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("catalog failure: {0}")]
    Catalog(String),
    #[error("notification failure: {0}")]
    Notification(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unprocessable { .. } => {
                "The enrollment is not complete yet. Provide the missing information first."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Finalize(FinalizeError::Incomplete {
                missing,
            })) => Self::Unprocessable {
                message: format!("slots not yet valid: {missing:?}"),
                correlation_id: unassigned(),
            },
            ApplicationError::Domain(DomainError::Finalize(
                FinalizeError::CatalogUnavailable(message),
            ))
            | ApplicationError::Catalog(message)
            | ApplicationError::Notification(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Domain(DomainError::Flow(FlowError::UnknownSlot(slot))) => {
                Self::BadRequest {
                    message: format!("slot `{slot}` is not part of this flow"),
                    correlation_id: unassigned(),
                }
            }
            ApplicationError::Domain(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
