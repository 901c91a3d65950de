//! Deployment pipeline - build, force-recreate, follow

use crate::{
    core::{PipelineConfig, PipelineRun, Stage, StageResult, StreamErrorPolicy},
    execution::{FollowOutcome, PipelineError, ProcessExitStatus},
    tooling::{
        ContainerHandle, ImageBuilder, ImageRef, LogSink, LogStream, RecreateMode,
        ServiceOrchestrator, StreamError,
    },
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        service: String,
        image_tag: String,
    },
    StageStarted {
        stage: Stage,
    },
    ImageBuilt {
        image: ImageRef,
    },
    ServiceRecreated {
        container: ContainerHandle,
    },
    StageCompleted {
        stage: Stage,
        duration: Duration,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    FollowEnded {
        outcome: FollowOutcome,
    },
    PipelineFinished {
        execution_id: Uuid,
        status: ProcessExitStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Everything a finished run leaves behind
#[derive(Debug)]
pub struct PipelineReport {
    pub run: PipelineRun,
    pub result: Result<FollowOutcome, PipelineError>,
}

impl PipelineReport {
    pub fn exit_status(&self) -> ProcessExitStatus {
        ProcessExitStatus::from_result(&self.result)
    }
}

/// Why the follow loop stopped
enum FollowEnd {
    Cancelled,
    Closed,
    Failed(StreamError),
    SinkClosed(std::io::Error),
}

/// Runs the three stages strictly in order, stopping at the first failure
pub struct DeploymentPipeline<B, O> {
    builder: B,
    orchestrator: O,
    event_handlers: Vec<EventHandler>,
}

impl<B: ImageBuilder, O: ServiceOrchestrator> DeploymentPipeline<B, O> {
    pub fn new(builder: B, orchestrator: O) -> Self {
        Self {
            builder,
            orchestrator,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run the pipeline and return its exit status
    pub async fn run_to_exit<F>(
        &self,
        config: &PipelineConfig,
        sink: &dyn LogSink,
        shutdown: F,
    ) -> ProcessExitStatus
    where
        F: Future<Output = ()> + Send,
    {
        self.execute(config, sink, shutdown).await.exit_status()
    }

    /// Run the pipeline
    ///
    /// `shutdown` is only polled while following logs; when it completes the
    /// follow stage ends cleanly. No orchestrator call is made after that.
    pub async fn execute<F>(
        &self,
        config: &PipelineConfig,
        sink: &dyn LogSink,
        shutdown: F,
    ) -> PipelineReport
    where
        F: Future<Output = ()> + Send,
    {
        let mut run = PipelineRun::new();
        let execution_id = run.execution_id;
        let span = info_span!(
            "pipeline",
            execution_id = %execution_id,
            service = %config.service_name
        );

        let result = self
            .drive(&mut run, config, sink, shutdown)
            .instrument(span)
            .await;

        let status = ProcessExitStatus::from_result(&result);
        match &result {
            Ok(outcome) => info!("Pipeline finished: {:?}", outcome),
            Err(e) => error!("Pipeline failed: {}", e),
        }
        self.emit_event(ExecutionEvent::PipelineFinished {
            execution_id,
            status,
        });

        PipelineReport { run, result }
    }

    async fn drive<F>(
        &self,
        run: &mut PipelineRun,
        config: &PipelineConfig,
        sink: &dyn LogSink,
        shutdown: F,
    ) -> Result<FollowOutcome, PipelineError>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            "Deploying {} as service {}",
            config.image_tag, config.service_name
        );
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id: run.execution_id,
            service: config.service_name.clone(),
            image_tag: config.image_tag.clone(),
        });

        let image = self.build(run, config).await?;
        self.recreate(run, config, &image).await?;
        self.follow(run, config, sink, shutdown).await
    }

    async fn build(
        &self,
        run: &mut PipelineRun,
        config: &PipelineConfig,
    ) -> Result<ImageRef, PipelineError> {
        self.begin(run, Stage::Build)?;
        info!(
            "Building {} from {} ({})",
            config.image_tag,
            config.build_context.display(),
            config.dockerfile.display()
        );

        let result = self
            .builder
            .build(&config.build_context, &config.image_tag, &config.dockerfile)
            .await
            .map_err(PipelineError::Build);
        let image = self.settle(run, result)?;

        self.emit_event(ExecutionEvent::ImageBuilt {
            image: image.clone(),
        });
        Ok(image)
    }

    async fn recreate(
        &self,
        run: &mut PipelineRun,
        config: &PipelineConfig,
        image: &ImageRef,
    ) -> Result<ContainerHandle, PipelineError> {
        self.begin(run, Stage::Recreate)?;
        info!("Force-recreating service {} on {}", config.service_name, image);

        let result = self
            .orchestrator
            .recreate(&config.service_name, image, RecreateMode::Force)
            .await
            .map_err(PipelineError::Recreate);
        let container = self.settle(run, result)?;

        self.emit_event(ExecutionEvent::ServiceRecreated {
            container: container.clone(),
        });
        Ok(container)
    }

    async fn follow<F>(
        &self,
        run: &mut PipelineRun,
        config: &PipelineConfig,
        sink: &dyn LogSink,
        shutdown: F,
    ) -> Result<FollowOutcome, PipelineError>
    where
        F: Future<Output = ()> + Send,
    {
        self.begin(run, Stage::Follow)?;
        info!("Following logs of {}", config.service_name);

        let result = self
            .orchestrator
            .follow_logs(&config.service_name)
            .await
            .map_err(PipelineError::Follow);
        let mut stream = self.settle_failure(run, result)?;

        let (end, lines) = pump(stream.as_mut(), sink, shutdown).await;
        stream.close().await;
        debug!("Log stream released");

        let result = match end {
            FollowEnd::Cancelled => {
                info!("Interrupted, leaving {} running", config.service_name);
                Ok(FollowOutcome::Cancelled { lines })
            }
            FollowEnd::Closed => {
                info!("Log stream of {} closed", config.service_name);
                Ok(FollowOutcome::StreamClosed { lines })
            }
            FollowEnd::SinkClosed(e) => {
                info!("Output closed ({}), leaving {} running", e, config.service_name);
                Ok(FollowOutcome::OutputClosed { lines })
            }
            FollowEnd::Failed(e) => {
                warn!("Log stream of {} failed: {}", config.service_name, e);
                match config.stream_error_policy {
                    StreamErrorPolicy::Ignore => Ok(FollowOutcome::StreamFailed {
                        lines,
                        error: e.to_string(),
                    }),
                    StreamErrorPolicy::Fail => Err(PipelineError::Stream(e)),
                }
            }
        };

        let outcome = self.settle(run, result)?;
        debug!("Follow ended after {} lines", outcome.lines());
        self.emit_event(ExecutionEvent::FollowEnded {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn begin(&self, run: &mut PipelineRun, stage: Stage) -> Result<(), PipelineError> {
        run.begin_stage(stage)?;
        debug!("Stage {}/{}: {}", stage.position(), Stage::ALL.len(), stage);
        self.emit_event(ExecutionEvent::StageStarted { stage });
        Ok(())
    }

    /// Close the running stage with the result's outcome
    fn settle<T>(
        &self,
        run: &mut PipelineRun,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let stage_result = match &result {
            Ok(_) => StageResult::Success,
            Err(e) => StageResult::Failure(e.to_string()),
        };

        let record = run.end_stage(stage_result)?;
        let (stage, duration) = (record.stage, record.duration());
        match &result {
            Ok(_) => self.emit_event(ExecutionEvent::StageCompleted { stage, duration }),
            Err(e) => self.emit_event(ExecutionEvent::StageFailed {
                stage,
                error: e.to_string(),
            }),
        }
        result
    }

    /// Close the running stage only if the result is a failure
    fn settle_failure<T>(
        &self,
        run: &mut PipelineRun,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => self.settle(run, Err(e)),
        }
    }
}

/// Copy lines from the stream to the sink until it ends or `shutdown` fires
async fn pump<F>(stream: &mut dyn LogStream, sink: &dyn LogSink, shutdown: F) -> (FollowEnd, usize)
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    let mut lines = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return (FollowEnd::Cancelled, lines),
            item = stream.next_line() => match item {
                Some(Ok(line)) => {
                    if let Err(e) = sink.on_line(&line) {
                        return (FollowEnd::SinkClosed(e), lines);
                    }
                    lines += 1;
                }
                Some(Err(e)) => return (FollowEnd::Failed(e), lines),
                None => return (FollowEnd::Closed, lines),
            },
        }
    }
}
