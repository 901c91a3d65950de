//! Test: build and recreate succeed, logs are followed

use crate::helpers::*;
use devdb::core::{PipelineConfig, PipelineState, Stage};
use devdb::execution::{FollowOutcome, ProcessExitStatus};
use devdb::tooling::{ImageRef, RecreateMode};
use std::path::PathBuf;
use std::time::Duration;

/// Lines are written and the pipeline keeps running until interrupted
#[tokio::test]
async fn test_follow_blocks_after_streaming_lines() {
    let harness = Harness::healthy(&["db ready", "listening on 5432"], StreamEnd::Block);
    let config = PipelineConfig::default();

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        harness.run(&config, std::future::pending()),
    )
    .await;

    assert!(result.is_err(), "Pipeline should still be following");
    assert_eq!(harness.sink.lines(), vec!["db ready", "listening on 5432"]);
    assert_eq!(harness.follow_calls(), 1);
}

/// Stages are invoked once each, in order, with the configured values
#[tokio::test]
async fn test_stages_run_in_order_with_config_values() {
    let harness = Harness::healthy(&["db ready"], StreamEnd::Close);
    let config = PipelineConfig::default();

    let report = harness.run(&config, std::future::pending()).await;
    assert_eq!(report.exit_status(), ProcessExitStatus::Success);
    assert_eq!(report.result.unwrap(), FollowOutcome::StreamClosed { lines: 1 });

    let built = ImageRef::new("opennem/database:dev").with_id("sha256:0123456789abcdef");
    assert_eq!(
        harness.calls(),
        vec![
            Call::Build {
                context: PathBuf::from("."),
                tag: "opennem/database:dev".to_string(),
                dockerfile: PathBuf::from("infra/database/Dockerfile"),
            },
            Call::Recreate {
                service: "database".to_string(),
                image: built,
                mode: RecreateMode::Force,
            },
            Call::FollowLogs {
                service: "database".to_string(),
            },
            Call::StreamClosed,
        ]
    );
}

/// The image handed to recreate is the one the build produced
#[tokio::test]
async fn test_recreate_receives_built_image() {
    let harness = Harness::healthy(&[], StreamEnd::Close);
    let config = PipelineConfig::default()
        .with_image_tag("opennem/database:feature")
        .with_service_name("timescale");

    harness.run(&config, std::future::pending()).await;

    let recreate = harness
        .calls()
        .into_iter()
        .find(|c| matches!(c, Call::Recreate { .. }))
        .expect("recreate should be called");
    match recreate {
        Call::Recreate { service, image, mode } => {
            assert_eq!(service, "timescale");
            assert_eq!(image.tag, "opennem/database:feature");
            assert!(image.id.is_some());
            assert_eq!(mode, RecreateMode::Force);
        }
        other => panic!("Unexpected call {:?}", other),
    }
}

/// Recreate is always forced, run after run
#[tokio::test]
async fn test_recreate_always_forced() {
    let harness = Harness::healthy(&[], StreamEnd::Close);
    let config = PipelineConfig::default();

    for _ in 0..3 {
        harness.run(&config, std::future::pending()).await;
    }

    let modes: Vec<RecreateMode> = harness
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Recreate { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![RecreateMode::Force; 3]);
}

/// A stream that ends on its own completes the run
#[tokio::test]
async fn test_stream_close_finishes_run() {
    let harness = Harness::healthy(&["db ready", "shutting down"], StreamEnd::Close);

    let report = harness.run(&PipelineConfig::default(), std::future::pending()).await;

    assert_eq!(report.run.state, PipelineState::Done);
    assert_eq!(report.run.completed_stages(), Stage::ALL.to_vec());
    assert_eq!(harness.sink.lines(), vec!["db ready", "shutting down"]);
    assert_eq!(harness.calls().last(), Some(&Call::StreamClosed));
}
