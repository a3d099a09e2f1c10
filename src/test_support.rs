//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedSession`] stands in for an SSH session: commands answer from a
//! FIFO of scripted responses, and SFTP operations act on an in-memory map of
//! remote files. Every call is recorded for assertions.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::session::{
    CommandOutput, ConnectFuture, ConnectionError, ConnectionTarget, Connector, RemoteSession,
    SessionError, SessionFuture,
};

/// Records a single operation made through [`ScriptedSession`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionCall {
    /// A command execution.
    Exec {
        /// Command line as sent to the session.
        command: String,
        /// Deadline passed with the command.
        timeout: Option<Duration>,
    },
    /// A file upload.
    Upload {
        /// Local source path.
        local: Utf8PathBuf,
        /// Remote destination path.
        remote: String,
    },
    /// A remote directory creation.
    MakeDir(String),
    /// A file download.
    Download {
        /// Remote source path.
        remote: String,
        /// Local destination path.
        local: Utf8PathBuf,
    },
    /// A remote file removal.
    Delete(String),
}

#[derive(Debug, Default)]
struct SessionState {
    responses: VecDeque<Result<CommandOutput, SessionError>>,
    remote_files: BTreeMap<String, Vec<u8>>,
    remote_dirs: BTreeSet<String>,
    failing_paths: BTreeSet<String>,
    fault_from: Option<usize>,
    fail_close: bool,
    calls: Vec<SessionCall>,
    close_calls: usize,
}

impl SessionState {
    /// Records `call` and reports a fault when the scripted drop point has
    /// been reached.
    fn record(&mut self, call: SessionCall) -> Result<(), SessionError> {
        let index = self.calls.len();
        self.calls.push(call);
        match self.fault_from {
            Some(from) if index >= from => Err(SessionError::fault("scripted connection drop")),
            _ => Ok(()),
        }
    }

    fn check_failing(&self, path: &str) -> Result<(), SessionError> {
        if self.failing_paths.contains(path) {
            return Err(SessionError::transfer(path, "permission denied"));
        }
        Ok(())
    }
}

/// Scripted in-memory session.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the runner owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSession {
    state: Arc<Mutex<SessionState>>,
}

impl ScriptedSession {
    /// Creates a session with no queued responses and no remote files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an explicit command output. Unqueued commands exit 0 silently.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.state().responses.push_back(Ok(CommandOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
    }

    /// Queues a specific exit code with empty output.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Queues a command timeout carrying partial output.
    pub fn push_timeout(&self, after: Duration, stdout: impl Into<String>) {
        self.state().responses.push_back(Err(SessionError::Timeout {
            after,
            stdout: stdout.into(),
            stderr: String::new(),
        }));
    }

    /// Queues an arbitrary error for the next command.
    pub fn push_error(&self, error: SessionError) {
        self.state().responses.push_back(Err(error));
    }

    /// Places a file on the simulated remote.
    pub fn put_remote_file(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.state()
            .remote_files
            .insert(path.into(), contents.into());
    }

    /// Marks a remote directory as already present.
    pub fn put_remote_dir(&self, path: impl Into<String>) {
        self.state().remote_dirs.insert(path.into());
    }

    /// Makes uploads to and deletions of `path` fail with a transfer error.
    pub fn fail_path(&self, path: impl Into<String>) {
        self.state().failing_paths.insert(path.into());
    }

    /// Makes the call with zero-based index `index`, and every call after it,
    /// fail with [`SessionError::Fault`].
    pub fn fault_on_call(&self, index: usize) {
        self.state().fault_from = Some(index);
    }

    /// Makes [`RemoteSession::close`] report a fault.
    pub fn fail_close(&self) {
        self.state().fail_close = true;
    }

    /// Returns a snapshot of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state().calls.clone()
    }

    /// Returns the recorded command lines in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                SessionCall::Exec { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the paths currently present on the simulated remote.
    #[must_use]
    pub fn remote_paths(&self) -> Vec<String> {
        self.state().remote_files.keys().cloned().collect()
    }

    /// Returns the contents of a simulated remote file.
    #[must_use]
    pub fn remote_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().remote_files.get(path).cloned()
    }

    /// Number of times [`RemoteSession::close`] was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }
}

impl RemoteSession for ScriptedSession {
    fn exec<'a>(
        &'a self,
        command: &'a str,
        timeout: Option<Duration>,
    ) -> SessionFuture<'a, CommandOutput> {
        Box::pin(async move {
            let mut state = self.state();
            state.record(SessionCall::Exec {
                command: command.to_owned(),
                timeout,
            })?;
            state
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput {
                    exit_code: Some(0),
                    ..CommandOutput::default()
                }))
        })
    }

    fn upload_file<'a>(&'a self, local: &'a Utf8Path, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.record(SessionCall::Upload {
                local: local.to_path_buf(),
                remote: remote.to_owned(),
            })?;
            state.check_failing(remote)?;
            let contents = std::fs::read(local)
                .map_err(|err| SessionError::transfer(local.as_str(), err.to_string()))?;
            state.remote_files.insert(remote.to_owned(), contents);
            Ok(())
        })
    }

    fn make_dir<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.record(SessionCall::MakeDir(remote.to_owned()))?;
            if state.remote_dirs.insert(remote.to_owned()) {
                Ok(())
            } else {
                Err(SessionError::transfer(remote, "file exists"))
            }
        })
    }

    fn download_file<'a>(&'a self, remote: &'a str, local: &'a Utf8Path) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.record(SessionCall::Download {
                remote: remote.to_owned(),
                local: local.to_path_buf(),
            })?;
            let contents = state
                .remote_files
                .get(remote)
                .ok_or_else(|| SessionError::transfer(remote, "no such file"))?;
            std::fs::write(local, contents)
                .map_err(|err| SessionError::transfer(local.as_str(), err.to_string()))
        })
    }

    fn delete_file<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.record(SessionCall::Delete(remote.to_owned()))?;
            state.check_failing(remote)?;
            state
                .remote_files
                .remove(remote)
                .map(|_| ())
                .ok_or_else(|| SessionError::transfer(remote, "no such file"))
        })
    }

    fn close(&self) -> SessionFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.close_calls += 1;
            if state.fail_close {
                return Err(SessionError::fault("scripted close failure"));
            }
            Ok(())
        })
    }
}

/// Connector handing out a shared [`ScriptedSession`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    session: ScriptedSession,
    failure: Option<ConnectionError>,
    connect_calls: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    /// Connector whose connections all succeed with `session`.
    #[must_use]
    pub fn new(session: ScriptedSession) -> Self {
        Self {
            session,
            failure: None,
            connect_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connector whose connections all fail with `error`.
    #[must_use]
    pub fn failing(error: ConnectionError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Session handed out on successful connections.
    #[must_use]
    pub const fn session(&self) -> &ScriptedSession {
        &self.session
    }

    /// Number of connection attempts so far.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn connect<'a>(&'a self, _target: &'a ConnectionTarget) -> ConnectFuture<'a, ScriptedSession> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.failure
                .clone()
                .map_or_else(|| Ok(self.session.clone()), Err)
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets `pairs` and removes `unset` while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in unset {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
