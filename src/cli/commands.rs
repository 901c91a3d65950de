//! CLI command definitions

use crate::core::{PipelineConfig, StreamErrorPolicy};
use clap::Args;

/// Build the image, force-recreate the service and follow its logs
#[derive(Debug, Args, Clone, Default)]
pub struct UpCommand {
    /// Image tag to build and run
    #[arg(long)]
    pub tag: Option<String>,

    /// Dockerfile path
    #[arg(long)]
    pub dockerfile: Option<String>,

    /// Build context directory
    #[arg(long)]
    pub context: Option<String>,

    /// Compose service to recreate and follow
    #[arg(long)]
    pub service: Option<String>,

    /// Compose file
    #[arg(short = 'f', long)]
    pub compose_file: Option<String>,

    /// Compose project name
    #[arg(short = 'p', long)]
    pub project_name: Option<String>,

    /// Number of existing log lines to show before following
    #[arg(long)]
    pub tail: Option<usize>,

    /// What a broken log stream means for the exit code
    #[arg(long, value_enum)]
    pub on_stream_error: Option<StreamErrorPolicyArg>,

    /// Prefix log lines with the time they were received
    #[arg(long)]
    pub timestamps: bool,
}

impl UpCommand {
    /// Layer the flags that were given over `config`
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(tag) = &self.tag {
            config = config.with_image_tag(tag.as_str());
        }
        if let Some(dockerfile) = &self.dockerfile {
            config = config.with_dockerfile(dockerfile.as_str());
        }
        if let Some(context) = &self.context {
            config = config.with_build_context(context.as_str());
        }
        if let Some(service) = &self.service {
            config = config.with_service_name(service.as_str());
        }
        if let Some(file) = &self.compose_file {
            config = config.with_compose_file(file.as_str());
        }
        if let Some(project) = &self.project_name {
            config = config.with_project_name(project.as_str());
        }
        if let Some(tail) = self.tail {
            config = config.with_log_tail(tail);
        }
        if let Some(policy) = self.on_stream_error {
            config = config.with_stream_error_policy(policy.into());
        }
        config
    }
}

/// Show the resolved configuration
#[derive(Debug, Args, Clone)]
pub struct ConfigCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Stream error policy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StreamErrorPolicyArg {
    Ignore,
    Fail,
}

impl From<StreamErrorPolicyArg> for StreamErrorPolicy {
    fn from(arg: StreamErrorPolicyArg) -> Self {
        match arg {
            StreamErrorPolicyArg::Ignore => StreamErrorPolicy::Ignore,
            StreamErrorPolicyArg::Fail => StreamErrorPolicy::Fail,
        }
    }
}
