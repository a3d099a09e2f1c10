//! Rendering annotated events for the command line.

use std::io::{self, Write};

use serde::Serialize;

use crate::event::{Event, EventKind, EventResult, EventStatus};

/// Exit status when every event completed and every command exited zero.
pub const EXIT_OK: i32 = 0;
/// Exit status when an event failed, timed out, or a command exited non-zero.
pub const EXIT_EVENT_FAILED: i32 = 2;

#[derive(Debug, Serialize)]
struct EventSummary<'a> {
    index: usize,
    kind: EventKind,
    description: String,
    result: Option<&'a EventResult>,
}

/// Returns `true` when the event counts against the run's exit status.
///
/// A command that reported no exit status (for example one killed by a
/// signal) counts as unsuccessful.
fn is_unsuccessful(event: &Event) -> bool {
    event.result().is_none_or(|result| {
        result.did_fail()
            || (event.kind() == EventKind::Execute && result.return_code != Some(0))
    })
}

/// Exit status summarising the events of a finished run.
#[must_use]
pub fn exit_code(events: &[Event]) -> i32 {
    if events.iter().any(is_unsuccessful) {
        EXIT_EVENT_FAILED
    } else {
        EXIT_OK
    }
}

/// Writes one line per event.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn write_summary(mut out: impl Write, events: &[Event]) -> io::Result<()> {
    for (index, event) in events.iter().enumerate() {
        let description = event.describe();
        match event.result() {
            None => writeln!(out, "{index}: skipped    {description}")?,
            Some(result) => {
                let label = match result.status {
                    EventStatus::Succeeded => "ok",
                    EventStatus::Failed => "failed",
                    EventStatus::TimedOut => "timed out",
                };
                write!(out, "{index}: {label:<10} {description}")?;
                if let Some(code) = result.return_code {
                    write!(out, " (exit {code})")?;
                }
                if let Some(error) = &result.error {
                    write!(out, ": {error}")?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

/// Writes the events and their results as a JSON array.
///
/// # Errors
///
/// Propagates serialisation and write failures from `out`.
pub fn write_json(mut out: impl Write, events: &[Event]) -> io::Result<()> {
    let summaries: Vec<_> = events
        .iter()
        .enumerate()
        .map(|(index, event)| EventSummary {
            index,
            kind: event.kind(),
            description: event.describe(),
            result: event.result(),
        })
        .collect();
    serde_json::to_writer_pretty(&mut out, &summaries)?;
    writeln!(out)
}
