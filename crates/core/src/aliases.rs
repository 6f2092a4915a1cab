//! Declarative alias tables mapping free text to canonical catalog keys.
//!
//! Matching policy: the input is normalized (lowercase, punctuation folded to
//! spaces, whitespace collapsed) and every entry is tried in declaration order.
//! The first entry owning a trigger phrase that occurs in the input as a whole
//! word sequence wins, so earlier entries take priority when triggers overlap.
//! Short acronyms live in a separate `exact` list and only fire when they are
//! the whole normalized input ("ma" is also Italian for "but").
//! When nothing triggers, an input that equals a canonical key (ignoring case)
//! passes through as that key.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AliasEntry {
    pub canonical: &'static str,
    pub triggers: &'static [&'static str],
    pub exact: &'static [&'static str],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AliasTable {
    name: &'static str,
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn new(name: &'static str, entries: &[AliasEntry]) -> Self {
        Self { name, entries: entries.to_vec() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn canonical_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.canonical)
    }

    pub fn normalize(&self, raw: &str) -> Option<&'static str> {
        let normalized = normalize_text(raw);
        if normalized.is_empty() {
            return None;
        }
        let padded = format!(" {normalized} ");

        let triggered = self.entries.iter().find(|entry| {
            entry.exact.iter().any(|acronym| normalize_text(acronym) == normalized)
                || entry.triggers.iter().any(|trigger| {
                    let trigger = normalize_text(trigger);
                    !trigger.is_empty() && padded.contains(&format!(" {trigger} "))
                })
        });
        if let Some(entry) = triggered {
            return Some(entry.canonical);
        }

        let trimmed = raw.trim();
        self.entries
            .iter()
            .find(|entry| entry.canonical.to_lowercase() == trimmed.to_lowercase())
            .map(|entry| entry.canonical)
    }
}

pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for character in text.chars().flat_map(char::to_lowercase) {
        match character {
            '\u{2019}' | '\u{2018}' | '`' | '\u{b4}' => folded.push('\''),
            c if c.is_alphanumeric() || c == '\'' => folded.push(c),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub const ENGINEERING: &str = "Enginering";
pub const COMPUTER_SCIENCE: &str = "Computer Science";
pub const MEDICINE: &str = "Medicine";
pub const ECONOMICS: &str = "Economics";
pub const LAW: &str = "Law";
pub const HUMANITIES: &str = "Humanities";
pub const SCIENCES: &str = "Sciences";
pub const ARCHITECTURE: &str = "Architecture";

// "ingegneria informatica" triggers both engineering and computer science;
// engineering is declared first and wins.
const FIELD_OF_STUDY_ENTRIES: &[AliasEntry] = &[
    AliasEntry {
        canonical: ENGINEERING,
        triggers: &["ingegneria", "ingegnere", "engineering", "enginering", "engineer"],
        exact: &["ing"],
    },
    AliasEntry {
        canonical: COMPUTER_SCIENCE,
        triggers: &[
            "informatica",
            "computer science",
            "computing",
            "informatique",
            "informatik",
        ],
        exact: &["cs"],
    },
    AliasEntry {
        canonical: MEDICINE,
        triggers: &["medicina", "medicine", "medical", "chirurgia", "surgery", "odontoiatria"],
        exact: &[],
    },
    AliasEntry {
        canonical: ECONOMICS,
        triggers: &["economia", "economics", "economy", "business", "management", "finanza", "finance"],
        exact: &[],
    },
    AliasEntry {
        canonical: LAW,
        triggers: &["giurisprudenza", "legge", "diritto", "law", "legal", "jurisprudence"],
        exact: &[],
    },
    AliasEntry {
        canonical: HUMANITIES,
        triggers: &[
            "lettere",
            "filosofia",
            "storia",
            "lingue",
            "humanities",
            "philosophy",
            "history",
            "languages",
            "literature",
        ],
        exact: &[],
    },
    AliasEntry {
        canonical: SCIENCES,
        triggers: &[
            "scienze",
            "science",
            "sciences",
            "fisica",
            "physics",
            "chimica",
            "chemistry",
            "matematica",
            "mathematics",
            "math",
            "biologia",
            "biology",
        ],
        exact: &[],
    },
    AliasEntry {
        canonical: ARCHITECTURE,
        triggers: &["architettura", "architecture", "architect", "architetto"],
        exact: &[],
    },
];

pub const SINGLE_CYCLE: &str = "Single-Cycle Master's Degree";
pub const MASTERS: &str = "Master's Degree";
pub const BACHELORS: &str = "Bachelor's Degree";

// Single-cycle phrases mention "magistrale"/"master" too, so that family is
// declared ahead of the plain master's family.
const DEGREE_TYPE_ENTRIES: &[AliasEntry] = &[
    AliasEntry {
        canonical: SINGLE_CYCLE,
        triggers: &[
            "ciclo unico",
            "a ciclo unico",
            "single cycle",
            "single-cycle",
            "singlecycle",
            "lmcu",
            "five year",
            "six year",
            "quinquennale",
            "integrated master",
        ],
        exact: &[],
    },
    AliasEntry {
        canonical: MASTERS,
        triggers: &[
            "magistrale",
            "laurea magistrale",
            "specialistica",
            "laurea specialistica",
            "master",
            "master's",
            "masters",
            "master degree",
            "msc",
            "m sc",
            "secondo livello",
            "second cycle",
            "graduate",
        ],
        exact: &["ma", "lm"],
    },
    AliasEntry {
        canonical: BACHELORS,
        triggers: &[
            "triennale",
            "laurea triennale",
            "primo livello",
            "laurea di primo livello",
            "bachelor",
            "bachelor's",
            "bachelors",
            "bsc",
            "b sc",
            "undergraduate",
            "first cycle",
            "three year",
        ],
        exact: &["ba"],
    },
];

pub fn field_of_study_table() -> AliasTable {
    AliasTable::new("field_of_study", FIELD_OF_STUDY_ENTRIES)
}

pub fn degree_type_table() -> AliasTable {
    AliasTable::new("degree_type", DEGREE_TYPE_ENTRIES)
}
