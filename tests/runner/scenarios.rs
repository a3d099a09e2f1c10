//! BDD scenarios for the runner.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunContext, run_context};

#[scenario(
    path = "tests/features/runner.feature",
    name = "Annotate every event of a healthy run"
)]
fn scenario_healthy_run(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Connection failure runs nothing"
)]
fn scenario_connection_failure(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Record a missing local file and keep going"
)]
fn scenario_missing_local_file(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Clean up everything that was copied"
)]
fn scenario_cleanup(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Abort the remaining events when the session drops"
)]
fn scenario_session_fault(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Stop at the first failure when asked"
)]
fn scenario_stop_on_failure(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Keep partial output when a command times out"
)]
fn scenario_timeout(run_context: RunContext) {
    drop(run_context);
}
