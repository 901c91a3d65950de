//! Error types for the external tooling collaborators

use thiserror::Error;

/// Image construction failed
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context is not a directory: {0}")]
    InvalidContext(String),

    #[error("Dockerfile not found: {0}")]
    MissingDockerfile(String),

    #[error("Failed to start image builder: {0}")]
    Spawn(String),

    #[error("Image build exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("Image build timed out after {0} seconds")]
    Timeout(u64),
}

/// The service could not be resolved, recreated or attached to
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Failed to start orchestrator: {0}")]
    Spawn(String),

    #[error("Orchestrator exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("Orchestrator timed out after {0} seconds")]
    Timeout(u64),

    #[error("Log stream for service '{0}' has no output handle")]
    NoOutput(String),
}

/// A log stream ended abnormally after it started
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to read log stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log stream exited with code {code}: {stderr}")]
    Exited { code: i32, stderr: String },
}

/// Trim captured stderr down to its last few lines for error messages
pub(crate) fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
