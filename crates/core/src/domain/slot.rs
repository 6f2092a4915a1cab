use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    FieldOfStudy,
    DegreeType,
    DegreeId,
    Courses,
    Email,
}

impl SlotName {
    /// Elicitation order of the enrollment flow.
    pub const ALL: [SlotName; 5] =
        [Self::FieldOfStudy, Self::DegreeType, Self::DegreeId, Self::Courses, Self::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldOfStudy => "field_of_study",
            Self::DegreeType => "degree_type",
            Self::DegreeId => "degree_id",
            Self::Courses => "courses",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown slot name `{0}`")]
pub struct UnknownSlotName(pub String);

impl FromStr for SlotName {
    type Err = UnknownSlotName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "field_of_study" | "field" | "category" => Ok(Self::FieldOfStudy),
            "degree_type" | "type" => Ok(Self::DegreeType),
            "degree_id" | "degree" | "course_id" => Ok(Self::DegreeId),
            "courses" | "course" | "elective" | "electives" => Ok(Self::Courses),
            "email" | "contact" => Ok(Self::Email),
            other => Err(UnknownSlotName(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Unset,
    Valid,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotValue {
    Text(String),
    /// De-duplicated, in acceptance order.
    Selection(Vec<String>),
}

impl SlotValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Selection(_) => None,
        }
    }

    pub fn as_selection(&self) -> &[String] {
        match self {
            Self::Selection(values) => values,
            Self::Text(_) => &[],
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Selection(values) => f.write_str(&values.join(", ")),
        }
    }
}

/// One named piece of collected information. Mutated only through the cascade
/// controller, which applies validator decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    name: SlotName,
    raw_input: Option<String>,
    value: Option<SlotValue>,
    state: SlotState,
    validated_against: BTreeMap<SlotName, SlotValue>,
}

impl Slot {
    pub fn new(name: SlotName) -> Self {
        Self {
            name,
            raw_input: None,
            value: None,
            state: SlotState::Unset,
            validated_against: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> SlotName {
        self.name
    }

    pub fn raw_input(&self) -> Option<&str> {
        self.raw_input.as_deref()
    }

    pub fn value(&self) -> Option<&SlotValue> {
        self.value.as_ref()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == SlotState::Valid
    }

    /// Upstream values this slot was last validated against.
    pub fn validated_against(&self) -> &BTreeMap<SlotName, SlotValue> {
        &self.validated_against
    }

    /// True when the slot holds nothing worth reporting as reset.
    pub fn is_pristine(&self) -> bool {
        self.state == SlotState::Unset && self.value.is_none() && self.raw_input.is_none()
    }

    pub(crate) fn record(
        &mut self,
        raw_input: &str,
        value: Option<SlotValue>,
        state: SlotState,
        validated_against: BTreeMap<SlotName, SlotValue>,
    ) {
        self.raw_input = Some(raw_input.to_string());
        self.value = value;
        self.state = state;
        self.validated_against = validated_against;
    }

    pub(crate) fn record_raw(&mut self, raw_input: &str, state: SlotState) {
        self.raw_input = Some(raw_input.to_string());
        self.state = state;
    }

    pub(crate) fn clear(&mut self) {
        self.raw_input = None;
        self.value = None;
        self.state = SlotState::Unset;
        self.validated_against.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Slot, SlotName, SlotState, SlotValue};

    #[test]
    fn slot_names_parse_runtime_aliases() {
        assert_eq!("field_of_study".parse::<SlotName>(), Ok(SlotName::FieldOfStudy));
        assert_eq!(" Degree ".parse::<SlotName>(), Ok(SlotName::DegreeId));
        assert_eq!("course".parse::<SlotName>(), Ok(SlotName::Courses));
        assert!("phone".parse::<SlotName>().is_err());
    }

    #[test]
    fn slot_names_round_trip_through_display() {
        for name in SlotName::ALL {
            assert_eq!(name.to_string().parse::<SlotName>(), Ok(name));
        }
    }

    #[test]
    fn cleared_slot_is_pristine() {
        let mut slot = Slot::new(SlotName::Email);
        slot.record(
            "a@b.it",
            Some(SlotValue::Text("a@b.it".to_string())),
            SlotState::Valid,
            Default::default(),
        );
        assert!(!slot.is_pristine());

        slot.clear();
        assert!(slot.is_pristine());
        assert_eq!(slot.state(), SlotState::Unset);
    }
}
