//! Scenario-based tests for the deployment pipeline

mod build_failure;
mod closed_output;
mod happy_path;
mod recreate_failure;
mod stream_errors;
