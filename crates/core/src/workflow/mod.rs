pub mod engine;
pub mod policy;
pub mod states;

pub use engine::{NewValidationRequest, ValidationEngine, WorkflowError};
pub use policy::{
    AbsoluteRejection, CompletionPolicy, QuorumTolerant, RejectionPolicy, ValidationTally, Verdict,
};
pub use states::{Decision, WorkflowCommand, WorkflowContext, WorkflowEvent, WorkflowOutcome};
