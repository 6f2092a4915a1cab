pub mod engine;
pub mod graph;
pub mod states;

pub use engine::{CascadeController, EnrollmentFlow, FlowDefinition, FlowError};
pub use graph::{DependencyEdge, DependencyGraph, GraphError, InvariantViolation};
pub use states::{
    transition, Decision, SlotEvent, SlotTransition, SlotTransitionError, SubmissionOutcome,
};
