//! Test: a failed recreate stops the pipeline before following

use crate::helpers::*;
use devdb::core::{PipelineConfig, PipelineState, Stage};
use devdb::execution::{PipelineError, ProcessExitStatus};

fn port_conflict() -> Harness {
    Harness::new(
        BuildBehavior::Succeed,
        OrchestratorBehavior {
            recreate: Err("port 5432 already in use".to_string()),
            ..OrchestratorBehavior::default()
        },
    )
}

/// Port conflict: non-zero exit, follow never called
#[tokio::test]
async fn test_port_conflict_skips_follow() {
    let harness = port_conflict();

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::RecreateFailed);
    assert_ne!(report.exit_status(), ProcessExitStatus::BuildFailed);
    assert_eq!(harness.recreate_calls(), 1);
    assert_eq!(harness.follow_calls(), 0);

    let error = report.result.unwrap_err();
    assert!(matches!(error, PipelineError::Recreate(_)));
    assert!(error.to_string().contains("port 5432 already in use"));
}

/// The built image is left alone; no cleanup call follows the failure
#[tokio::test]
async fn test_no_cleanup_after_recreate_failure() {
    let harness = port_conflict();

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.run.state, PipelineState::Failed);
    assert_eq!(report.run.failed_stage(), Some(Stage::Recreate));
    assert_eq!(report.run.completed_stages(), vec![Stage::Build, Stage::Recreate]);
    assert!(matches!(harness.calls().last(), Some(Call::Recreate { .. })));
}

/// A log stream that cannot be started fails the follow stage
#[tokio::test]
async fn test_follow_start_failure() {
    let harness = Harness::new(
        BuildBehavior::Succeed,
        OrchestratorBehavior {
            follow: Err("docker: command not found".to_string()),
            ..OrchestratorBehavior::default()
        },
    );

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::FollowFailed);
    assert!(matches!(report.result, Err(PipelineError::Follow(_))));
    assert_eq!(report.run.failed_stage(), Some(Stage::Follow));
    assert!(!harness.calls().contains(&Call::StreamClosed));
}
