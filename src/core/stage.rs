//! The three ordered pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Build the image from the build context
    Build,
    /// Force-recreate the service container
    Recreate,
    /// Attach to the service's log stream
    Follow,
}

impl Stage {
    /// All stages in the order they run
    pub const ALL: [Stage; 3] = [Stage::Build, Stage::Recreate, Stage::Follow];

    /// 1-based position, used for `[n/3]` headers
    pub fn position(&self) -> usize {
        match self {
            Stage::Build => 1,
            Stage::Recreate => 2,
            Stage::Follow => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Recreate => "recreate",
            Stage::Follow => "follow",
        }
    }

    /// Stage that runs after this one succeeds
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Build => Some(Stage::Recreate),
            Stage::Recreate => Some(Stage::Follow),
            Stage::Follow => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
