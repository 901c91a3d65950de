//! Compose CLI orchestrator - recreates and follows a single service

use crate::core::ToolingConfig;
use crate::tooling::error::stderr_tail;
use crate::tooling::streaming::read_lossy_line;
use crate::tooling::{
    BoxedLogStream, ContainerHandle, ImageRef, LogLine, LogStream, OrchestrationError,
    RecreateMode, ServiceOrchestrator, StreamError,
};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

/// Orchestrator backed by `docker compose` (or any compatible command)
#[derive(Debug, Clone)]
pub struct ComposeOrchestrator {
    /// Program plus leading arguments, e.g. `["docker", "compose"]`
    command: Vec<String>,

    compose_file: Option<PathBuf>,

    project_name: Option<String>,

    /// Environment variable the image reference is exported through
    image_variable: String,

    /// Timeout for `up` in seconds (0 = none)
    timeout_secs: u64,

    log_tail: Option<usize>,
}

impl ComposeOrchestrator {
    pub fn from_config(config: &ToolingConfig) -> Self {
        Self {
            command: config.compose.clone(),
            compose_file: config.compose_file.clone(),
            project_name: config.project_name.clone(),
            image_variable: config.image_variable.clone(),
            timeout_secs: config.recreate_timeout_secs,
            log_tail: config.log_tail,
        }
    }

    /// Arguments shared by every invocation, after the program itself
    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.command.iter().skip(1).map(OsString::from).collect();
        if let Some(file) = &self.compose_file {
            args.push("--file".into());
            args.push(file.into());
        }
        if let Some(project) = &self.project_name {
            args.push("--project-name".into());
            args.push(project.into());
        }
        args
    }

    /// Arguments for `up`
    pub fn recreate_args(&self, service: &str, mode: RecreateMode) -> Vec<OsString> {
        let mut args = self.base_args();
        args.push("up".into());
        args.push("--detach".into());
        if mode == RecreateMode::Force {
            args.push("--force-recreate".into());
        }
        args.push("--no-build".into());
        args.push(service.into());
        args
    }

    /// Arguments for `logs`
    pub fn logs_args(&self, service: &str) -> Vec<OsString> {
        let mut args = self.base_args();
        args.push("logs".into());
        args.push("--follow".into());
        if let Some(tail) = self.log_tail {
            args.push("--tail".into());
            args.push(tail.to_string().into());
        }
        args.push(service.into());
        args
    }

    fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("docker")
    }
}

#[async_trait]
impl ServiceOrchestrator for ComposeOrchestrator {
    async fn recreate(
        &self,
        service: &str,
        image: &ImageRef,
        mode: RecreateMode,
    ) -> Result<ContainerHandle, OrchestrationError> {
        let args = self.recreate_args(service, mode);
        debug!(
            "Spawning {} {:?} with {}={}",
            self.program(),
            args,
            self.image_variable,
            image.tag
        );

        let mut command = Command::new(self.program());
        command
            .args(&args)
            .env(&self.image_variable, &image.tag)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let result = if self.timeout_secs > 0 {
            timeout(Duration::from_secs(self.timeout_secs), command.output())
                .await
                .map_err(|_| OrchestrationError::Timeout(self.timeout_secs))?
        } else {
            command.output().await
        };

        let output = result
            .map_err(|e| OrchestrationError::Spawn(format!("{}: {}", self.program(), e)))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!("compose up for {} exited with code {}", service, code);
            return Err(OrchestrationError::Failed {
                code,
                stderr: stderr_tail(&output.stderr, STDERR_TAIL_LINES),
            });
        }

        info!("Service {} is running on {}", service, image);
        Ok(ContainerHandle {
            service: service.to_string(),
            image: image.clone(),
        })
    }

    async fn follow_logs(&self, service: &str) -> Result<BoxedLogStream, OrchestrationError> {
        let args = self.logs_args(service);
        debug!("Spawning {} {:?}", self.program(), args);

        let mut child = Command::new(self.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrchestrationError::Spawn(format!("{}: {}", self.program(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OrchestrationError::NoOutput(service.to_string()))?;

        Ok(Box::new(ComposeLogStream::new(service, child, stdout)))
    }
}

type LogReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Line stream over the stdout of a `logs --follow` child process
///
/// Lines are split on raw bytes and decoded lossily, so output in another
/// encoding never ends the stream. stderr is drained in the background so a
/// chatty child cannot block on a full pipe; it is only used for the error
/// message if the child fails.
pub struct ComposeLogStream {
    service: String,
    child: Option<Child>,
    reader: Option<LogReader>,
    buf: Vec<u8>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl ComposeLogStream {
    fn new<R>(service: &str, mut child: Child, stdout: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buffer).await {
                    debug!("Stopped draining log stream stderr: {}", e);
                }
                buffer
            })
        });

        Self {
            service: service.to_string(),
            child: Some(child),
            reader: Some(BufReader::new(Box::new(stdout))),
            buf: Vec::new(),
            stderr,
        }
    }

    /// stdout hit EOF: reap the child and turn a failing exit into one error item
    async fn finish(&mut self) -> Option<Result<LogLine, StreamError>> {
        self.reader = None;
        let mut child = self.child.take()?;

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(Err(StreamError::Io(e))),
        };

        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            debug!("Log stream for {} closed", self.service);
            None
        } else {
            Some(Err(StreamError::Exited {
                code: status.code().unwrap_or(-1),
                stderr: stderr_tail(&stderr, STDERR_TAIL_LINES),
            }))
        }
    }
}

#[async_trait]
impl LogStream for ComposeLogStream {
    async fn next_line(&mut self) -> Option<Result<LogLine, StreamError>> {
        let reader = self.reader.as_mut()?;

        match read_lossy_line(reader, &mut self.buf).await {
            Ok(Some(text)) => Some(Ok(LogLine::new(text))),
            Ok(None) => self.finish().await,
            Err(e) => {
                self.close().await;
                Some(Err(StreamError::Io(e)))
            }
        }
    }

    async fn close(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("Log stream child for {} already gone: {}", self.service, e);
            }
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
    }
}
