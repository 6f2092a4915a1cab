use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::language::Language;
use crate::domain::slot::{Slot, SlotName, SlotState, SlotValue};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// All slot state of one conversation. Sessions share nothing with each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    language: Language,
    slots: Vec<Slot>,
}

impl Session {
    pub fn new(slots: impl IntoIterator<Item = SlotName>, language: Language) -> Self {
        Self {
            id: SessionId::new(),
            language,
            slots: slots.into_iter().map(Slot::new).collect(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, name: SlotName) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.name() == name)
    }

    pub(crate) fn slot_mut(&mut self, name: SlotName) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.name() == name)
    }

    pub fn state(&self, name: SlotName) -> SlotState {
        self.slot(name).map(Slot::state).unwrap_or_default()
    }

    pub fn is_valid(&self, name: SlotName) -> bool {
        self.state(name) == SlotState::Valid
    }

    pub fn value(&self, name: SlotName) -> Option<&SlotValue> {
        self.slot(name).and_then(Slot::value)
    }

    /// Canonical value of a valid single-value slot.
    pub fn valid_text(&self, name: SlotName) -> Option<&str> {
        self.slot(name).filter(|slot| slot.is_valid()).and_then(Slot::value)?.as_text()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Slot::is_valid)
    }

    pub fn unsatisfied(&self) -> Vec<SlotName> {
        self.slots.iter().filter(|slot| !slot.is_valid()).map(Slot::name).collect()
    }
}
