//! Units of remote work and the results recorded against them.
//!
//! An [`Event`] pairs an [`Action`] with a result slot. The runner calls
//! [`Event::apply`] exactly once per run; `apply` always leaves a result in
//! the slot, even when it goes on to return a session fault.

use std::fmt;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use shell_escape::unix::escape;
use tracing::{debug, info};

use crate::session::{CommandOutput, RemoteSession, SessionError};

mod copied;
mod upload;

pub use copied::CopiedPaths;

/// Discriminant of an [`Action`], used in logs and reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Remote command execution.
    Execute,
    /// Upload to the remote host.
    CopyToRemote,
    /// Download from the remote host.
    CopyFromRemote,
    /// Removal of everything previously uploaded.
    DeleteAllCopiedToRemote,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Execute => "execute",
            Self::CopyToRemote => "copy_to_remote",
            Self::CopyFromRemote => "copy_from_remote",
            Self::DeleteAllCopiedToRemote => "delete_all_copied_to_remote",
        })
    }
}

/// Parameters of a remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecuteEvent {
    /// Shell command passed to the remote side verbatim.
    pub command: String,
    /// Per-event deadline overriding the runner default.
    pub timeout: Option<Duration>,
    /// Remote directory to `cd` into before running the command.
    pub working_dir: Option<String>,
}

impl ExecuteEvent {
    /// Returns the command line sent to the remote host.
    ///
    /// With a working directory the command is prefixed by a `cd` into the
    /// shell-escaped directory.
    #[must_use]
    pub fn remote_command(&self) -> String {
        self.working_dir.as_ref().map_or_else(
            || self.command.clone(),
            |dir| format!("cd {} && {}", escape(dir.as_str().into()), self.command),
        )
    }
}

/// Parameters of an upload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyToRemoteEvent {
    /// Local file or directory to send.
    pub local: Utf8PathBuf,
    /// Destination path on the remote host.
    pub remote: String,
}

/// Parameters of a download.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyFromRemoteEvent {
    /// Remote file to fetch.
    pub remote: String,
    /// Local destination path.
    pub local: Utf8PathBuf,
}

/// What an event does when applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Run a command.
    Execute(ExecuteEvent),
    /// Upload a file or directory tree.
    CopyToRemote(CopyToRemoteEvent),
    /// Download a file.
    CopyFromRemote(CopyFromRemoteEvent),
    /// Delete every remote path uploaded so far in this run.
    DeleteAllCopiedToRemote,
}

impl Action {
    /// Returns the discriminant of this action.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Execute(_) => EventKind::Execute,
            Self::CopyToRemote(_) => EventKind::CopyToRemote,
            Self::CopyFromRemote(_) => EventKind::CopyFromRemote,
            Self::DeleteAllCopiedToRemote => EventKind::DeleteAllCopiedToRemote,
        }
    }
}

/// Outcome category of an applied event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// The action completed. For commands this says nothing about the exit
    /// code, which is reported separately.
    Succeeded,
    /// The action could not be completed.
    Failed,
    /// The command outlived its deadline.
    TimedOut,
}

/// Result recorded on an event after it has been applied.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EventResult {
    /// Outcome category.
    pub status: EventStatus,
    /// Exit status of a remote command, when one was reported.
    pub return_code: Option<i32>,
    /// Standard output of a remote command.
    pub stdout: Option<String>,
    /// Standard error of a remote command.
    pub stderr: Option<String>,
    /// Error text for failed or timed out events.
    pub error: Option<String>,
}

impl EventResult {
    /// Result of a copy or delete action that completed.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            status: EventStatus::Succeeded,
            return_code: None,
            stdout: None,
            stderr: None,
            error: None,
        }
    }

    /// Result of a command that ran to completion, whatever its exit code.
    #[must_use]
    pub fn from_output(output: CommandOutput) -> Self {
        Self {
            status: EventStatus::Succeeded,
            return_code: output.exit_code,
            stdout: Some(output.stdout),
            stderr: Some(output.stderr),
            error: None,
        }
    }

    /// Result of an action that failed with `error`.
    #[must_use]
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            status: EventStatus::Failed,
            return_code: None,
            stdout: None,
            stderr: None,
            error: Some(error.to_string()),
        }
    }

    /// Result of a command that hit its deadline, keeping partial output.
    #[must_use]
    pub fn timed_out(after: Duration, stdout: String, stderr: String) -> Self {
        Self {
            status: EventStatus::TimedOut,
            return_code: None,
            stdout: Some(stdout),
            stderr: Some(stderr),
            error: Some(format!("command timed out after {}s", after.as_secs())),
        }
    }

    /// Returns `true` unless the action completed.
    ///
    /// A command exiting non-zero has still completed; inspect
    /// [`EventResult::return_code`] for that.
    #[must_use]
    pub const fn did_fail(&self) -> bool {
        !matches!(self.status, EventStatus::Succeeded)
    }
}

/// An action together with the result of applying it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    action: Action,
    result: Option<EventResult>,
}

impl Event {
    /// Wraps `action` with an empty result slot.
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            result: None,
        }
    }

    /// Runs `command` on the remote host.
    pub fn execute(command: impl Into<String>) -> Self {
        Self::new(Action::Execute(ExecuteEvent {
            command: command.into(),
            timeout: None,
            working_dir: None,
        }))
    }

    /// Uploads `local` to `remote`.
    pub fn copy_to_remote(local: impl Into<Utf8PathBuf>, remote: impl Into<String>) -> Self {
        Self::new(Action::CopyToRemote(CopyToRemoteEvent {
            local: local.into(),
            remote: remote.into(),
        }))
    }

    /// Downloads `remote` into `local`.
    pub fn copy_from_remote(remote: impl Into<String>, local: impl Into<Utf8PathBuf>) -> Self {
        Self::new(Action::CopyFromRemote(CopyFromRemoteEvent {
            remote: remote.into(),
            local: local.into(),
        }))
    }

    /// Deletes everything uploaded earlier in the run.
    #[must_use]
    pub const fn delete_all_copied_to_remote() -> Self {
        Self::new(Action::DeleteAllCopiedToRemote)
    }

    /// Sets a deadline on an execute event. Other kinds are returned
    /// unchanged.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Action::Execute(ref mut exec) = self.action {
            exec.timeout = Some(timeout);
        }
        self
    }

    /// Sets the remote working directory of an execute event. Other kinds
    /// are returned unchanged.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        if let Action::Execute(ref mut exec) = self.action {
            exec.working_dir = Some(dir.into());
        }
        self
    }

    /// The action this event performs.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Discriminant of the action.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.action.kind()
    }

    /// Result recorded by the last [`Event::apply`], if any.
    #[must_use]
    pub const fn result(&self) -> Option<&EventResult> {
        self.result.as_ref()
    }

    /// Returns `true` once a result has been recorded.
    #[must_use]
    pub const fn is_executed(&self) -> bool {
        self.result.is_some()
    }

    pub(crate) fn clear_result(&mut self) {
        self.result = None;
    }

    /// Short human-readable description for logs and summaries.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.action {
            Action::Execute(exec) => format!("execute `{}`", exec.command),
            Action::CopyToRemote(copy) => format!("copy {} -> {}", copy.local, copy.remote),
            Action::CopyFromRemote(copy) => format!("copy {} <- {}", copy.local, copy.remote),
            Action::DeleteAllCopiedToRemote => String::from("delete copied files"),
        }
    }

    /// Applies the action to `session` and records the result.
    ///
    /// `default_timeout` bounds execute events that carry no deadline of
    /// their own.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError::Fault`] that left the session unusable.
    /// The event is marked failed before the error is returned. Every other
    /// failure is recorded on the event and yields `Ok`.
    pub async fn apply<S: RemoteSession + ?Sized>(
        &mut self,
        session: &S,
        copied: &mut CopiedPaths,
        default_timeout: Option<Duration>,
    ) -> Result<(), SessionError> {
        let outcome = match &self.action {
            Action::Execute(exec) => {
                let limit = exec.timeout.or(default_timeout);
                session
                    .exec(&exec.remote_command(), limit)
                    .await
                    .map(EventResult::from_output)
            }
            Action::CopyToRemote(copy) => {
                upload::upload_path(session, &copy.local, &copy.remote, copied)
                    .await
                    .map(|count| {
                        debug!(files = count, remote = %copy.remote, "upload finished");
                        EventResult::succeeded()
                    })
            }
            Action::CopyFromRemote(copy) => session
                .download_file(&copy.remote, &copy.local)
                .await
                .map(|()| EventResult::succeeded()),
            Action::DeleteAllCopiedToRemote => delete_all(session, copied).await,
        };

        let (result, fault) = settle(outcome);
        self.result = Some(result);
        fault.map_or(Ok(()), Err)
    }
}

/// Splits an action outcome into the result to record and an optional fault
/// to propagate.
fn settle(outcome: Result<EventResult, SessionError>) -> (EventResult, Option<SessionError>) {
    match outcome {
        Ok(result) => (result, None),
        Err(SessionError::Timeout {
            after,
            stdout,
            stderr,
        }) => (EventResult::timed_out(after, stdout, stderr), None),
        Err(err) if err.is_fault() => (EventResult::failed(&err), Some(err)),
        Err(err) => (EventResult::failed(err), None),
    }
}

async fn delete_all<S: RemoteSession + ?Sized>(
    session: &S,
    copied: &mut CopiedPaths,
) -> Result<EventResult, SessionError> {
    let mut failures = Vec::new();
    let mut deleted = 0_usize;
    let pending: Vec<String> = copied.iter().map(str::to_owned).collect();
    for path in pending {
        match session.delete_file(&path).await {
            Ok(()) => {
                copied.remove(&path);
                deleted += 1;
            }
            Err(err) if err.is_fault() => return Err(err),
            Err(err) => failures.push(err.to_string()),
        }
    }
    copied.clear();
    info!(deleted, failed = failures.len(), "deleted copied remote files");

    if failures.is_empty() {
        Ok(EventResult::succeeded())
    } else {
        Ok(EventResult::failed(failures.join("; ")))
    }
}

/// Resolves the remote destination of an upload whose remote path was not
/// given: the local file name.
#[must_use]
pub fn default_remote_path(local: &Utf8Path) -> Option<String> {
    local.file_name().map(str::to_owned)
}
