//! Pipeline configuration: built-in defaults, optional YAML file, CLI overrides

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "devdb.yaml";

pub const DEFAULT_IMAGE_TAG: &str = "opennem/database:dev";
pub const DEFAULT_DOCKERFILE: &str = "infra/database/Dockerfile";
pub const DEFAULT_SERVICE_NAME: &str = "database";
pub const DEFAULT_IMAGE_VARIABLE: &str = "DATABASE_IMAGE";

// Docker reference grammar, minus digests: [host[:port]/]path[:tag]
const IMAGE_TAG_PATTERN: &str = r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?::[0-9]+)?(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?$";
const SERVICE_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$";
const ENV_VARIABLE_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// What a log stream error means for the process exit status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamErrorPolicy {
    /// Report the error, exit as if the stream had closed normally
    #[default]
    Ignore,
    /// Report the error and exit with the follow stage's failure code
    Fail,
}

/// Top-level pipeline configuration
///
/// Built once at process start and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tag the image is built under; reused across runs
    pub image_tag: String,

    /// Dockerfile path handed to the builder
    pub dockerfile: PathBuf,

    /// Build context directory
    pub build_context: PathBuf,

    /// Compose service that gets recreated and followed
    pub service_name: String,

    /// How log stream errors affect the exit status
    pub stream_error_policy: StreamErrorPolicy,

    /// External tool invocation settings
    pub tooling: ToolingConfig,
}

/// How the external docker and compose tools are invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolingConfig {
    /// Path to the docker executable
    pub docker: String,

    /// Compose command line prefix, e.g. `["docker", "compose"]` or `["docker-compose"]`
    pub compose: Vec<String>,

    /// Compose file passed with `--file`
    pub compose_file: Option<PathBuf>,

    /// Compose project name passed with `--project-name`
    pub project_name: Option<String>,

    /// Environment variable carrying the built image reference into compose
    pub image_variable: String,

    /// Build timeout in seconds (0 = no timeout)
    pub build_timeout_secs: u64,

    /// Recreate timeout in seconds (0 = no timeout)
    pub recreate_timeout_secs: u64,

    /// Only show this many existing lines before following
    pub log_tail: Option<usize>,
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            compose: vec!["docker".to_string(), "compose".to_string()],
            compose_file: None,
            project_name: None,
            image_variable: DEFAULT_IMAGE_VARIABLE.to_string(),
            build_timeout_secs: 1800,
            recreate_timeout_secs: 300,
            log_tail: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
            build_context: PathBuf::from("."),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            stream_error_policy: StreamErrorPolicy::default(),
            tooling: ToolingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve the configuration source
    ///
    /// An explicit path must exist. Without one, `devdb.yaml` in the working
    /// directory is used when present, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from a YAML string; missing keys take defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check names and command lines; file existence is the builder's concern
    pub fn validate(&self) -> Result<()> {
        let image_tag = Regex::new(IMAGE_TAG_PATTERN)?;
        if !image_tag.is_match(&self.image_tag) {
            anyhow::bail!("Invalid image tag: '{}'", self.image_tag);
        }

        let service_name = Regex::new(SERVICE_NAME_PATTERN)?;
        if !service_name.is_match(&self.service_name) {
            anyhow::bail!("Invalid service name: '{}'", self.service_name);
        }

        let env_variable = Regex::new(ENV_VARIABLE_PATTERN)?;
        if !env_variable.is_match(&self.tooling.image_variable) {
            anyhow::bail!(
                "Invalid image variable name: '{}'",
                self.tooling.image_variable
            );
        }

        if self.tooling.docker.trim().is_empty() {
            anyhow::bail!("Docker executable must not be empty");
        }

        if self.tooling.compose.first().map_or(true, |c| c.trim().is_empty()) {
            anyhow::bail!("Compose command must not be empty");
        }

        if let Some(project) = &self.tooling.project_name {
            if !service_name.is_match(project) {
                anyhow::bail!("Invalid compose project name: '{}'", project);
            }
        }

        Ok(())
    }

    pub fn with_image_tag(mut self, image_tag: impl Into<String>) -> Self {
        self.image_tag = image_tag.into();
        self
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<PathBuf>) -> Self {
        self.dockerfile = dockerfile.into();
        self
    }

    pub fn with_build_context(mut self, build_context: impl Into<PathBuf>) -> Self {
        self.build_context = build_context.into();
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_stream_error_policy(mut self, policy: StreamErrorPolicy) -> Self {
        self.stream_error_policy = policy;
        self
    }

    pub fn with_compose_file(mut self, compose_file: impl Into<PathBuf>) -> Self {
        self.tooling.compose_file = Some(compose_file.into());
        self
    }

    pub fn with_project_name(mut self, project_name: impl Into<String>) -> Self {
        self.tooling.project_name = Some(project_name.into());
        self
    }

    pub fn with_log_tail(mut self, tail: usize) -> Self {
        self.tooling.log_tail = Some(tail);
        self
    }
}
