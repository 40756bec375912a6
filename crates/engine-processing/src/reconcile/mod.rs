pub mod reconciler;
pub mod state_machine;

pub use reconciler::{ChunkFailure, FileStatusReconciler, StatusProposal, StatusUpdateOutcome};
pub use state_machine::{DefaultFileStateMachine, FileStateMachine, StatusPlan, plan_changes};
