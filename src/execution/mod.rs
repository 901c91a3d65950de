//! Pipeline execution engine

pub mod engine;
pub mod outcome;

pub use engine::{DeploymentPipeline, EventHandler, ExecutionEvent, PipelineReport};
pub use outcome::{FollowOutcome, PipelineError, ProcessExitStatus};
