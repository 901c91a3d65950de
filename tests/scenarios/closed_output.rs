//! Test: the operator's terminal stops accepting output while following

use crate::helpers::*;
use devdb::core::{PipelineConfig, PipelineState};
use devdb::execution::{FollowOutcome, ProcessExitStatus};

/// `devdb up | head -2`: follow ends cleanly once stdout is gone
#[tokio::test]
async fn test_closed_output_ends_follow_with_success() {
    let harness = Harness::healthy(
        &["db ready", "listening on 5432", "checkpoint starting"],
        StreamEnd::Block,
    );
    harness.sink.close_after(2);

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.exit_status(), ProcessExitStatus::Success);
    assert_eq!(report.result.unwrap(), FollowOutcome::OutputClosed { lines: 2 });
    assert_eq!(report.run.state, PipelineState::Done);
    assert_eq!(harness.sink.lines(), vec!["db ready", "listening on 5432"]);
}

/// The stream is released and the service is left alone
#[tokio::test]
async fn test_closed_output_releases_stream_only() {
    let harness = Harness::healthy(&["db ready", "listening on 5432"], StreamEnd::Block);
    harness.sink.close_after(0);

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.result.unwrap(), FollowOutcome::OutputClosed { lines: 0 });
    let calls = harness.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[3], Call::StreamClosed);
}
