//! Photo → processed image → 3D model pipeline.

mod orchestrator;
mod state;

pub use orchestrator::{Pipeline, PipelineSnapshot, RunOutcome};
pub use state::{FailureReport, PipelineMachine, PipelineStage, RunToken, Transition, TransitionError};
