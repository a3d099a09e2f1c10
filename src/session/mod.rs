//! Boundary between the runner and the SSH library.
//!
//! The runner never speaks SSH itself. It asks a [`Connector`] for a
//! [`RemoteSession`] and drives the session's exec and SFTP primitives. The
//! production connector wraps `russh` and `russh-sftp` (see [`SshConnector`]);
//! tests drive the same seam with [`crate::test_support::ScriptedSession`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use camino::Utf8Path;

mod error;
mod ssh;
mod target;

pub use error::{ConnectionError, SessionError};
pub use ssh::{SshConnector, SshSession};
pub use target::{ConnectionTarget, Credential, DEFAULT_SSH_PORT, HostKeyPolicy};

/// Output captured from a remote command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit status reported by the remote side, if one arrived.
    pub exit_code: Option<i32>,
    /// Concatenated standard output stream.
    pub stdout: String,
    /// Concatenated standard error stream.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Future returned by session operations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a, S> = Pin<Box<dyn Future<Output = Result<S, ConnectionError>> + Send + 'a>>;

/// An authenticated remote session.
///
/// Implementations report failures that leave the session unusable as
/// [`SessionError::Fault`]; every other error is scoped to the single
/// operation that raised it.
pub trait RemoteSession: Send + Sync {
    /// Runs `command` and collects its exit status and output streams.
    ///
    /// When `timeout` elapses first the implementation returns
    /// [`SessionError::Timeout`] carrying whatever output had arrived.
    fn exec<'a>(
        &'a self,
        command: &'a str,
        timeout: Option<Duration>,
    ) -> SessionFuture<'a, CommandOutput>;

    /// Writes the local file at `local` to `remote`, replacing any existing
    /// file.
    fn upload_file<'a>(&'a self, local: &'a Utf8Path, remote: &'a str) -> SessionFuture<'a, ()>;

    /// Creates the remote directory `remote`.
    fn make_dir<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()>;

    /// Reads the remote file at `remote` into the local file `local`.
    fn download_file<'a>(&'a self, remote: &'a str, local: &'a Utf8Path) -> SessionFuture<'a, ()>;

    /// Removes the remote file at `remote`.
    fn delete_file<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()>;

    /// Releases the session. Called exactly once by the runner.
    fn close(&self) -> SessionFuture<'_, ()>;
}

/// Opens remote sessions.
pub trait Connector {
    /// Session type produced by this connector.
    type Session: RemoteSession;

    /// Connects to `target` and authenticates with its credential.
    fn connect<'a>(&'a self, target: &'a ConnectionTarget) -> ConnectFuture<'a, Self::Session>;
}
