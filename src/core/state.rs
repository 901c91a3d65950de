//! Execution state models

use crate::core::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Position of a pipeline run
///
/// Transitions are linear: `NotStarted -> Building -> Recreating -> Following -> Done`,
/// with `Failed` reachable from any active stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    NotStarted,
    Building,
    Recreating,
    Following,
    Done,
    Failed,
}

impl PipelineState {
    /// State entered when `stage` starts
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Build => PipelineState::Building,
            Stage::Recreate => PipelineState::Recreating,
            Stage::Follow => PipelineState::Following,
        }
    }

    /// Stage currently running, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Building => Some(Stage::Build),
            PipelineState::Recreating => Some(Stage::Recreate),
            PipelineState::Following => Some(Stage::Follow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (*self, next) {
            (NotStarted, Building) | (Following, Done) => true,
            (from, Failed) => from.stage().is_some(),
            (from, to) => match (from.stage(), to.stage()) {
                (Some(current), Some(upcoming)) => current.next() == Some(upcoming),
                _ => false,
            },
        }
    }
}

/// Attempted transition outside the linear order
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid pipeline transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Outcome of a single stage, used only to decide whether to proceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageResult {
    Success,
    Failure(String),
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success)
    }
}

/// A finished stage with its timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub result: StageResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageRecord {
    pub fn duration(&self) -> std::time::Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Bookkeeping for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique execution ID, attached to log spans
    pub execution_id: Uuid,

    pub state: PipelineState,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Stages that have finished, in order
    pub stages: Vec<StageRecord>,

    current_stage_started: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            state: PipelineState::NotStarted,
            started_at: None,
            finished_at: None,
            stages: Vec::new(),
            current_stage_started: None,
        }
    }

    /// Move to `next`, rejecting anything outside the linear order
    pub fn advance(&mut self, next: PipelineState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        let now = Utc::now();
        if self.state == PipelineState::NotStarted {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.state = next;
        Ok(())
    }

    /// Enter the running state for `stage`
    pub fn begin_stage(&mut self, stage: Stage) -> Result<(), InvalidTransition> {
        self.advance(PipelineState::running(stage))?;
        self.current_stage_started = Some(Utc::now());
        Ok(())
    }

    /// Record the result of the running stage; failure moves the run to `Failed`
    pub fn end_stage(&mut self, result: StageResult) -> Result<&StageRecord, InvalidTransition> {
        let stage = self.state.stage().ok_or(InvalidTransition {
            from: self.state,
            to: PipelineState::Failed,
        })?;

        if !result.is_success() {
            self.advance(PipelineState::Failed)?;
        } else if stage == Stage::Follow {
            self.advance(PipelineState::Done)?;
        }

        let finished_at = Utc::now();
        self.stages.push(StageRecord {
            stage,
            result,
            started_at: self.current_stage_started.take().unwrap_or(finished_at),
            finished_at,
        });
        Ok(&self.stages[self.stages.len() - 1])
    }

    /// Stages that were started and finished
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|record| record.stage).collect()
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|record| !record.result.is_success())
            .map(|record| record.stage)
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
