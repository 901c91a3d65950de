//! Values exchanged with the image builder and the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A built image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Tag the image was built under
    pub tag: String,

    /// Content id (`sha256:...`), when the builder could resolve it
    pub id: Option<String>,
}

impl ImageRef {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// First 12 hex digits of the id, the way docker abbreviates it
    pub fn short_id(&self) -> Option<&str> {
        self.id.as_deref().map(|id| {
            let hex = id.strip_prefix("sha256:").unwrap_or(id);
            hex.get(..12).unwrap_or(hex)
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.short_id() {
            Some(id) => write!(f, "{} ({})", self.tag, id),
            None => f.write_str(&self.tag),
        }
    }
}

/// How the orchestrator treats an existing container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecreateMode {
    /// Tear down and replace unconditionally
    Force,
    /// Leave the container alone when its configuration is unchanged
    IfChanged,
}

/// A running service container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub service: String,
    pub image: ImageRef,
}

/// One line of service output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}
