//! How a pipeline run ends, and the exit code that reports it

use crate::core::{InvalidTransition, Stage};
use crate::tooling::{BuildError, OrchestrationError, StreamError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fatal pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Build failed: {0}")]
    Build(#[source] BuildError),

    #[error("Recreate failed: {0}")]
    Recreate(#[source] OrchestrationError),

    #[error("Could not follow logs: {0}")]
    Follow(#[source] OrchestrationError),

    #[error("Log stream failed: {0}")]
    Stream(#[source] StreamError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl PipelineError {
    /// Stage the failure belongs to
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Build(_) => Some(Stage::Build),
            PipelineError::Recreate(_) => Some(Stage::Recreate),
            PipelineError::Follow(_) | PipelineError::Stream(_) => Some(Stage::Follow),
            PipelineError::State(_) => None,
        }
    }
}

/// How a successful deployment's follow stage ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowOutcome {
    /// The operator interrupted
    Cancelled { lines: usize },
    /// The service stopped and its stream ended
    StreamClosed { lines: usize },
    /// The stream broke and the error was only reported
    StreamFailed { lines: usize, error: String },
    /// Output could no longer be written (e.g. stdout closed by `head`)
    OutputClosed { lines: usize },
}

impl FollowOutcome {
    pub fn lines(&self) -> usize {
        match self {
            FollowOutcome::Cancelled { lines }
            | FollowOutcome::StreamClosed { lines }
            | FollowOutcome::StreamFailed { lines, .. }
            | FollowOutcome::OutputClosed { lines } => *lines,
        }
    }
}

/// Process exit status, one code per failing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessExitStatus {
    /// Deployment succeeded and following ended (interrupt or stream end)
    Success,
    /// Configuration, usage or internal error before or outside the stages
    Error,
    BuildFailed,
    RecreateFailed,
    FollowFailed,
}

impl ProcessExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ProcessExitStatus::Success => 0,
            ProcessExitStatus::Error => 1,
            ProcessExitStatus::BuildFailed => 2,
            ProcessExitStatus::RecreateFailed => 3,
            ProcessExitStatus::FollowFailed => 4,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessExitStatus::Success)
    }

    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Build => ProcessExitStatus::BuildFailed,
            Stage::Recreate => ProcessExitStatus::RecreateFailed,
            Stage::Follow => ProcessExitStatus::FollowFailed,
        }
    }

    /// The one place a run result becomes an exit status
    pub fn from_result(result: &Result<FollowOutcome, PipelineError>) -> Self {
        match result {
            Ok(_) => ProcessExitStatus::Success,
            Err(error) => error
                .stage()
                .map(Self::for_stage)
                .unwrap_or(ProcessExitStatus::Error),
        }
    }
}

impl From<ProcessExitStatus> for std::process::ExitCode {
    fn from(status: ProcessExitStatus) -> Self {
        std::process::ExitCode::from(status.code() as u8)
    }
}
