//! devdb - build the local database image, force-recreate its compose
//! service and follow its logs

pub mod cli;
pub mod core;
pub mod execution;
pub mod tooling;

// Re-export commonly used types
pub use core::{PipelineConfig, PipelineRun, PipelineState, Stage, StageResult, StreamErrorPolicy};
pub use execution::{DeploymentPipeline, ExecutionEvent, FollowOutcome, PipelineError, ProcessExitStatus};
pub use tooling::{ImageBuilder, ServiceOrchestrator, LogStream, LogSink, ImageRef, ContainerHandle, LogLine, RecreateMode};
pub use tooling::{BuildError, OrchestrationError, StreamError};
