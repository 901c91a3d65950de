//! Test: a failed build stops the pipeline before anything else runs

use crate::helpers::*;
use devdb::core::{PipelineConfig, PipelineState, Stage};
use devdb::execution::{PipelineError, ProcessExitStatus};
use devdb::tooling::BuildError;

/// Missing Dockerfile: non-zero exit, recreate and follow never called
#[tokio::test]
async fn test_missing_dockerfile_skips_later_stages() {
    let harness = Harness::new(
        BuildBehavior::MissingDockerfile("dockerfile not found".to_string()),
        OrchestratorBehavior::default(),
    );

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::BuildFailed);
    assert_ne!(report.exit_status().code(), 0);
    assert!(matches!(
        report.result,
        Err(PipelineError::Build(BuildError::MissingDockerfile(_)))
    ));
    assert_eq!(harness.recreate_calls(), 0);
    assert_eq!(harness.follow_calls(), 0);
    assert!(harness.sink.lines().is_empty());
}

/// Builder failure is recorded against the build stage only
#[tokio::test]
async fn test_builder_failure_recorded() {
    let harness = Harness::new(
        BuildBehavior::Fail("failed to solve: process \"/bin/sh -c apt-get install\"".to_string()),
        OrchestratorBehavior::default(),
    );

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.run.state, PipelineState::Failed);
    assert_eq!(report.run.failed_stage(), Some(Stage::Build));
    assert_eq!(report.run.completed_stages(), vec![Stage::Build]);
    assert_eq!(harness.calls().len(), 1);

    let error = report.result.unwrap_err().to_string();
    assert!(error.contains("failed to solve"), "error was: {}", error);
}

/// An interrupt that is already pending does not matter when the build fails
#[tokio::test]
async fn test_build_failure_wins_over_interrupt() {
    let harness = Harness::new(
        BuildBehavior::Fail("boom".to_string()),
        OrchestratorBehavior::default(),
    );

    let status = harness
        .pipeline()
        .run_to_exit(&PipelineConfig::default(), &harness.sink, std::future::ready(()))
        .await;

    assert_eq!(status, ProcessExitStatus::BuildFailed);
    assert_eq!(harness.recreate_calls(), 0);
}
