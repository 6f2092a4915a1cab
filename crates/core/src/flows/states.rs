use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::slot::{SlotName, SlotState, SlotValue};
use crate::errors::SlotError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotEvent {
    ValueAccepted,
    ValueRejected,
    /// A group slot stored a value but is still below its minimum cardinality.
    SelectionIncomplete,
    Resubmitted,
    UpstreamChanged,
    Reset,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid slot transition from {state:?} using event {event:?}")]
pub struct SlotTransitionError {
    pub state: SlotState,
    pub event: SlotEvent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTransition {
    pub from: SlotState,
    pub to: SlotState,
    pub event: SlotEvent,
}

pub fn transition(
    current: SlotState,
    event: SlotEvent,
) -> Result<SlotTransition, SlotTransitionError> {
    use SlotEvent::{
        Reset, Resubmitted, SelectionIncomplete, UpstreamChanged, ValueAccepted, ValueRejected,
    };
    use SlotState::{Invalid, Unset, Valid};

    let to = match (current, event) {
        (Unset, ValueAccepted) | (Valid, ValueAccepted) => Valid,
        (Unset, SelectionIncomplete) => Unset,
        (Unset, ValueRejected) => Invalid,
        (Invalid, Resubmitted) => Unset,
        (_, UpstreamChanged) | (_, Reset) => Unset,
        _ => return Err(SlotTransitionError { state: current, event }),
    };

    Ok(SlotTransition { from: current, to, event })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accepted { value: SlotValue },
    /// Value stored, group requirement not met yet.
    Incomplete { value: SlotValue, error: SlotError },
    Rejected { error: SlotError },
    /// Transient failure; the slot was left untouched.
    Retry { error: SlotError },
}

impl Decision {
    pub fn error(&self) -> Option<&SlotError> {
        match self {
            Self::Accepted { .. } => None,
            Self::Incomplete { error, .. } | Self::Rejected { error } | Self::Retry { error } => {
                Some(error)
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Incomplete { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub slot: SlotName,
    pub decision: Decision,
    pub state: SlotState,
    /// Downstream slots cleared because this slot's value changed.
    pub reset: Vec<SlotName>,
}
