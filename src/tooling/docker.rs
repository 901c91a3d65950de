//! Docker CLI image builder - calls `docker build` as a subprocess

use crate::core::ToolingConfig;
use crate::tooling::error::stderr_tail;
use crate::tooling::streaming::read_lossy_line;
use crate::tooling::{BuildError, ImageBuilder, ImageRef, LogLine, LogSink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines of builder stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Image builder backed by the docker CLI
#[derive(Clone)]
pub struct DockerImageBuilder {
    /// Path to docker executable
    docker: String,

    /// Timeout for the build in seconds (0 = none)
    timeout_secs: u64,

    /// Receives builder output lines while the build runs
    progress: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for DockerImageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerImageBuilder")
            .field("docker", &self.docker)
            .field("timeout_secs", &self.timeout_secs)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl DockerImageBuilder {
    /// Create a new builder
    ///
    /// # Arguments
    /// * `docker` - Path to docker executable (e.g., "docker", "/usr/local/bin/docker")
    /// * `timeout_secs` - Build timeout in seconds, 0 to wait indefinitely
    pub fn new(docker: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            docker: docker.into(),
            timeout_secs,
            progress: None,
        }
    }

    pub fn from_config(config: &ToolingConfig) -> Self {
        Self::new(config.docker.clone(), config.build_timeout_secs)
    }

    /// Forward build output to `sink` line by line as it is produced
    pub fn with_progress(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    #[cfg(test)]
    pub fn docker_path(&self) -> &str {
        &self.docker
    }

    /// Arguments for `docker build`
    pub fn build_args(context: &Path, tag: &str, dockerfile: &Path) -> Vec<OsString> {
        vec![
            "build".into(),
            "--tag".into(),
            tag.into(),
            "--file".into(),
            dockerfile.into(),
            context.into(),
        ]
    }

    /// Look up the content id of a freshly built tag
    ///
    /// Failure here does not fail the build; the tag alone still identifies the image.
    async fn resolve_id(&self, tag: &str) -> Option<String> {
        let output = Command::new(&self.docker)
            .args(["image", "inspect", "--format", "{{.Id}}", tag])
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if id.is_empty() {
                    None
                } else {
                    Some(id)
                }
            }
            Ok(output) => {
                warn!(
                    "Could not resolve image id for {}: {}",
                    tag,
                    stderr_tail(&output.stderr, 1)
                );
                None
            }
            Err(e) => {
                warn!("Could not resolve image id for {}: {}", tag, e);
                None
            }
        }
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn build(
        &self,
        context: &Path,
        tag: &str,
        dockerfile: &Path,
    ) -> Result<ImageRef, BuildError> {
        if !context.is_dir() {
            return Err(BuildError::InvalidContext(context.display().to_string()));
        }
        if !dockerfile.is_file() {
            return Err(BuildError::MissingDockerfile(dockerfile.display().to_string()));
        }

        let args = Self::build_args(context, tag, dockerfile);
        debug!("Spawning {} {:?}", self.docker, args);

        let mut child = Command::new(&self.docker)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Spawn(format!("{}: {}", self.docker, e)))?;

        // BuildKit reports progress on stderr, the classic builder on stdout
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, self.progress.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, self.progress.clone())));

        // Dropping `child` on timeout kills the build
        let result = if self.timeout_secs > 0 {
            timeout(Duration::from_secs(self.timeout_secs), child.wait())
                .await
                .map_err(|_| BuildError::Timeout(self.timeout_secs))?
        } else {
            child.wait().await
        };
        let status = result.map_err(|e| BuildError::Spawn(format!("{}: {}", self.docker, e)))?;

        let stdout_lines = match stdout {
            Some(handle) => handle.await.map(|tail| tail.total).unwrap_or(0),
            None => 0,
        };
        let errors = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => OutputTail::default(),
        };

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            warn!("docker build exited with code {}", code);
            return Err(BuildError::Failed {
                code,
                stderr: errors.joined(),
            });
        }

        debug!(
            "docker build wrote {} lines of output",
            stdout_lines + errors.total
        );

        let image = match self.resolve_id(tag).await {
            Some(id) => ImageRef::new(tag).with_id(id),
            None => ImageRef::new(tag),
        };
        info!("Built image {}", image);

        Ok(image)
    }
}

/// Last lines of one builder output pipe
#[derive(Debug, Default)]
struct OutputTail {
    lines: VecDeque<String>,
    total: usize,
}

impl OutputTail {
    fn push(&mut self, line: String) {
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.total += 1;
    }

    fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Read `pipe` to the end, passing each line to `progress` and keeping a tail
async fn forward_lines<R>(pipe: R, progress: Option<Arc<dyn LogSink>>) -> OutputTail
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut tail = OutputTail::default();

    loop {
        match read_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(text)) => {
                if let Some(sink) = &progress {
                    if let Err(e) = sink.on_line(&LogLine::new(text.as_str())) {
                        debug!("Dropping build output: {}", e);
                    }
                }
                tail.push(text);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading build output: {}", e);
                break;
            }
        }
    }
    tail
}
