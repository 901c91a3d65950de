//! Core domain models
//!
//! Configuration, the ordered stages and the run state machine.

pub mod config;
pub mod stage;
pub mod state;

pub use config::{PipelineConfig, StreamErrorPolicy, ToolingConfig};
pub use stage::*;
pub use state::*;
