//! Test: a log stream that breaks after following started

use crate::helpers::*;
use devdb::core::{PipelineConfig, PipelineState, Stage, StreamErrorPolicy};
use devdb::execution::{FollowOutcome, PipelineError, ProcessExitStatus};

fn broken_stream() -> Harness {
    Harness::healthy(
        &["db ready"],
        StreamEnd::Error("error from daemon in stream: connection reset".to_string()),
    )
}

#[tokio::test]
async fn test_stream_error_ignored_by_default() {
    let harness = broken_stream();

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::Success);
    assert_eq!(report.run.state, PipelineState::Done);
    match report.result.unwrap() {
        FollowOutcome::StreamFailed { lines, error } => {
            assert_eq!(lines, 1);
            assert!(error.contains("connection reset"), "error was: {}", error);
        }
        other => panic!("Expected StreamFailed, got {:?}", other),
    }
    assert_eq!(harness.calls().last(), Some(&Call::StreamClosed));
}

#[tokio::test]
async fn test_stream_error_fails_when_configured() {
    let harness = broken_stream();
    let config = PipelineConfig::default().with_stream_error_policy(StreamErrorPolicy::Fail);

    let report = harness.run(&config, std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::FollowFailed);
    assert_eq!(report.exit_status().code(), 4);
    assert!(matches!(report.result, Err(PipelineError::Stream(_))));
    assert_eq!(report.run.failed_stage(), Some(Stage::Follow));
    assert_eq!(harness.sink.lines(), vec!["db ready"]);
    assert_eq!(harness.calls().last(), Some(&Call::StreamClosed));
}

/// A failing read is classified like any other stream error
#[tokio::test]
async fn test_read_error_follows_policy() {
    let harness = Harness::healthy(&["db ready"], StreamEnd::ReadError("pipe broke".to_string()));
    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;
    assert_eq!(report.exit_status(), ProcessExitStatus::Success);
    assert!(matches!(report.result, Ok(FollowOutcome::StreamFailed { lines: 1, .. })));

    let harness = Harness::healthy(&["db ready"], StreamEnd::ReadError("pipe broke".to_string()));
    let config = PipelineConfig::default().with_stream_error_policy(StreamErrorPolicy::Fail);
    let report = harness.run(&config, std::future::pending()).await;
    assert_eq!(report.exit_status(), ProcessExitStatus::FollowFailed);
    assert!(report.result.unwrap_err().to_string().contains("pipe broke"));

    // Released exactly once, by the pipeline
    assert_eq!(harness.count(|c| *c == Call::StreamClosed), 1);
}
