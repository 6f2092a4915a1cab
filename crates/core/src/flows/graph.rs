use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::Session;
use crate::domain::slot::{SlotName, SlotState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub upstream: SlotName,
    pub downstream: SlotName,
}

impl DependencyEdge {
    pub const fn new(upstream: SlotName, downstream: SlotName) -> Self {
        Self { upstream, downstream }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("dependency edge {upstream} -> {downstream} references a slot outside the flow")]
    UnknownSlot { upstream: SlotName, downstream: SlotName },
    #[error("slot {0} cannot depend on itself")]
    SelfLoop(SlotName),
    #[error("dependency graph contains a cycle through {0:?}")]
    Cycle(Vec<SlotName>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// A valid slot sits below an upstream slot that is not valid.
    UpstreamNotValid { slot: SlotName, upstream: SlotName, upstream_state: SlotState },
    /// A valid slot was validated against an upstream value that has since changed.
    StaleSnapshot { slot: SlotName, upstream: SlotName },
}

/// Static, acyclic slot dependency graph of one flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyGraph {
    order: Vec<SlotName>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub fn new(
        order: impl IntoIterator<Item = SlotName>,
        edges: impl IntoIterator<Item = DependencyEdge>,
    ) -> Result<Self, GraphError> {
        let order: Vec<SlotName> = order.into_iter().collect();
        let edges: Vec<DependencyEdge> = edges.into_iter().collect();

        for edge in &edges {
            if !order.contains(&edge.upstream) || !order.contains(&edge.downstream) {
                return Err(GraphError::UnknownSlot {
                    upstream: edge.upstream,
                    downstream: edge.downstream,
                });
            }
            if edge.upstream == edge.downstream {
                return Err(GraphError::SelfLoop(edge.upstream));
            }
        }

        let mut in_degree: BTreeMap<SlotName, usize> =
            order.iter().map(|slot| (*slot, 0)).collect();
        for edge in &edges {
            *in_degree.entry(edge.downstream).or_default() += 1;
        }

        let mut ready: VecDeque<SlotName> =
            order.iter().copied().filter(|slot| in_degree[slot] == 0).collect();
        let mut visited = 0usize;
        while let Some(slot) = ready.pop_front() {
            visited += 1;
            for edge in edges.iter().filter(|edge| edge.upstream == slot) {
                if let Some(degree) = in_degree.get_mut(&edge.downstream) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(edge.downstream);
                    }
                }
            }
        }

        if visited != order.len() {
            let stuck = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(slot, _)| slot)
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(Self { order, edges })
    }

    /// Enrollment flow graph: field and type scope the degree, the degree scopes courses.
    pub fn enrollment() -> Self {
        Self {
            order: SlotName::ALL.to_vec(),
            edges: vec![
                DependencyEdge::new(SlotName::FieldOfStudy, SlotName::DegreeId),
                DependencyEdge::new(SlotName::DegreeType, SlotName::DegreeId),
                DependencyEdge::new(SlotName::DegreeId, SlotName::Courses),
            ],
        }
    }

    pub fn order(&self) -> &[SlotName] {
        &self.order
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn contains(&self, slot: SlotName) -> bool {
        self.order.contains(&slot)
    }

    /// Direct upstream dependencies, in elicitation order.
    pub fn upstream(&self, slot: SlotName) -> Vec<SlotName> {
        self.order
            .iter()
            .copied()
            .filter(|candidate| {
                self.edges.iter().any(|edge| edge.upstream == *candidate && edge.downstream == slot)
            })
            .collect()
    }

    /// Transitive dependents of `slot`, in elicitation order, excluding `slot` itself.
    pub fn downstream_closure(&self, slot: SlotName) -> Vec<SlotName> {
        let mut reached = BTreeSet::new();
        let mut frontier = vec![slot];
        while let Some(current) = frontier.pop() {
            for edge in self.edges.iter().filter(|edge| edge.upstream == current) {
                if reached.insert(edge.downstream) {
                    frontier.push(edge.downstream);
                }
            }
        }
        self.order.iter().copied().filter(|candidate| reached.contains(candidate)).collect()
    }

    pub fn violations(&self, session: &Session) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for slot in session.slots().iter().filter(|slot| slot.is_valid()) {
            for upstream in self.upstream(slot.name()) {
                let upstream_state = session.state(upstream);
                if upstream_state != SlotState::Valid {
                    violations.push(InvariantViolation::UpstreamNotValid {
                        slot: slot.name(),
                        upstream,
                        upstream_state,
                    });
                    continue;
                }
                if slot.validated_against().get(&upstream) != session.value(upstream) {
                    violations
                        .push(InvariantViolation::StaleSnapshot { slot: slot.name(), upstream });
                }
            }
        }
        violations
    }
}
