//! BDD step definitions for the runner workflow.

use std::time::Duration;

use crrunner::test_support::ScriptedConnector;
use crrunner::{ConnectionError, Event, Runner};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{RunContext, RunOutcome, failure_label, parse_status, target};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn outcome(run_context: &RunContext) -> Result<&RunOutcome, StepError> {
    run_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("the runner has not run")))
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given("a healthy remote session")]
fn healthy_session(run_context: RunContext) -> RunContext {
    run_context
}

#[given("a remote that rejects authentication")]
fn rejecting_remote(run_context: RunContext) -> RunContext {
    run_context.with_connector(ScriptedConnector::failing(
        ConnectionError::AuthenticationFailed {
            target: target().to_string(),
        },
    ))
}

#[given("the connection drops on call \"{index}\"")]
fn connection_drops(run_context: RunContext, index: usize) -> RunContext {
    run_context.session.fault_on_call(index);
    run_context
}

#[given("the runner stops on the first failure")]
fn stop_on_failure(run_context: RunContext) -> RunContext {
    let options = run_context.options.clone().with_continue_on_error(false);
    run_context.with_options(options)
}

#[given("the next command times out after printing \"{stdout}\"")]
fn command_times_out(run_context: RunContext, stdout: String) -> RunContext {
    run_context
        .session
        .push_timeout(Duration::from_secs(1), stdout);
    run_context
}

#[given("a plan running \"{count}\" commands")]
fn plan_of_commands(run_context: RunContext, count: usize) -> RunContext {
    let events = (0..count)
        .map(|index| Event::execute(format!("echo {index}")))
        .collect();
    run_context.with_events(events)
}

#[given("a plan that uploads a missing file then runs a command")]
fn plan_with_missing_upload(run_context: RunContext) -> RunContext {
    let missing = run_context.local_root.join("missing.bin");
    run_context.with_events(vec![
        Event::copy_to_remote(missing, "/tmp/missing.bin"),
        Event::execute("echo after"),
    ])
}

#[given("a plan that uploads \"{count}\" files and cleans up twice")]
fn plan_with_cleanup(run_context: RunContext, count: usize) -> RunContext {
    let mut events: Vec<Event> = (0..count)
        .map(|index| {
            let name = format!("file-{index}.txt");
            let local = run_context.write_local(&name, "payload");
            Event::copy_to_remote(local, format!("/tmp/{name}"))
        })
        .collect();
    events.push(Event::delete_all_copied_to_remote());
    events.push(Event::delete_all_copied_to_remote());
    run_context.with_events(events)
}

#[when("the runner runs")]
fn runner_runs(run_context: RunContext) -> Result<RunContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let mut runner = Runner::new(
        run_context.connector.clone(),
        target(),
        run_context.events.clone(),
    )
    .with_options(run_context.options.clone());

    let failure = runtime
        .block_on(async { runner.run().await.err() })
        .map(|err| failure_label(&err).to_owned());
    let copied_left = runner.copied_paths().len();

    Ok(RunContext {
        outcome: Some(RunOutcome {
            events: runner.into_events(),
            failure,
            copied_left,
        }),
        ..run_context
    })
}

#[then("every event has a result")]
fn every_event_has_result(run_context: &RunContext) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(done.failure.is_none(), || {
        format!("run should succeed, got {:?}", done.failure)
    })?;
    check(done.events.iter().all(Event::is_executed), || {
        String::from("every event should carry a result")
    })
}

#[then("no event has a result")]
fn no_event_has_result(run_context: &RunContext) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(!done.events.iter().any(Event::is_executed), || {
        String::from("no event should have been applied")
    })?;
    check(run_context.session.calls().is_empty(), || {
        String::from("the session should not have been used")
    })
}

#[then("the session is closed once")]
fn session_closed_once(run_context: &RunContext) -> Result<(), StepError> {
    let closes = run_context.session.close_calls();
    check(closes == 1, || format!("expected one close, saw {closes}"))
}

#[then("the run fails with a \"{kind}\" error")]
fn run_fails_with(run_context: &RunContext, kind: String) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(done.failure.as_deref() == Some(kind.as_str()), || {
        format!("expected a {kind} error, got {:?}", done.failure)
    })
}

#[then("event \"{index}\" has status \"{status}\"")]
fn event_has_status(
    run_context: &RunContext,
    index: usize,
    status: String,
) -> Result<(), StepError> {
    let expected = parse_status(&status)
        .ok_or_else(|| StepError::Assertion(format!("unknown status {status}")))?;
    let done = outcome(run_context)?;
    let actual = done
        .events
        .get(index)
        .and_then(Event::result)
        .map(|result| result.status);
    check(actual == Some(expected), || {
        format!("event {index} should be {status}, got {actual:?}")
    })
}

#[then("event \"{index}\" printed \"{stdout}\"")]
fn event_printed(run_context: &RunContext, index: usize, stdout: String) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    let actual = done
        .events
        .get(index)
        .and_then(Event::result)
        .and_then(|result| result.stdout.clone());
    check(actual.as_deref() == Some(stdout.as_str()), || {
        format!("event {index} stdout should be {stdout:?}, got {actual:?}")
    })
}

#[then("events before \"{index}\" have results")]
fn events_before_have_results(run_context: &RunContext, index: usize) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(
        done.events.iter().take(index).all(Event::is_executed),
        || format!("events before {index} should carry results"),
    )
}

#[then("events from \"{index}\" have no result")]
fn events_from_have_no_result(run_context: &RunContext, index: usize) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(
        !done.events.iter().skip(index).any(Event::is_executed),
        || format!("events from {index} should not have run"),
    )
}

#[then("the remote holds no copied files")]
fn remote_is_clean(run_context: &RunContext) -> Result<(), StepError> {
    let left = run_context.session.remote_paths();
    check(left.is_empty(), || format!("remote still holds {left:?}"))
}

#[then("the runner tracks no copied paths")]
fn no_copied_paths(run_context: &RunContext) -> Result<(), StepError> {
    let done = outcome(run_context)?;
    check(done.copied_left == 0, || {
        format!("{} copied paths remain", done.copied_left)
    })?;
    check(
        done.events
            .iter()
            .all(|event| event.result().is_some_and(|result| !result.did_fail())),
        || String::from("every upload and cleanup should succeed"),
    )
}
