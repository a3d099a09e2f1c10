//! Error taxonomy for connecting to and using a remote session.

use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while opening a session. Nothing runs when these occur.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConnectionError {
    /// The TCP connection or SSH handshake failed.
    #[error("failed to connect to {target}: {message}")]
    Connect {
        /// Rendered `user@host:port` of the remote.
        target: String,
        /// Library error text.
        message: String,
    },
    /// The connection did not complete before the configured deadline.
    #[error("timed out connecting to {target} after {}s", .after.as_secs())]
    Timeout {
        /// Rendered `user@host:port` of the remote.
        target: String,
        /// Deadline that elapsed.
        after: Duration,
    },
    /// The server presented a host key the configured policy refused.
    #[error("host key for {target} was rejected")]
    HostKeyRejected {
        /// Rendered `user@host:port` of the remote.
        target: String,
    },
    /// The server refused the supplied credential.
    #[error("authentication failed for {target}")]
    AuthenticationFailed {
        /// Rendered `user@host:port` of the remote.
        target: String,
    },
    /// The private key file could not be read or decrypted.
    #[error("failed to load private key {path}: {message}")]
    KeyLoad {
        /// Key file that failed to load.
        path: Utf8PathBuf,
        /// Library error text.
        message: String,
    },
}

/// Errors raised by operations on an open session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// A file could not be transferred or removed. The session stays usable.
    #[error("file transfer failed for {path}: {message}")]
    Transfer {
        /// Local or remote path the operation concerned.
        path: String,
        /// Description of the failure.
        message: String,
    },
    /// The remote command could not be started. The session stays usable.
    #[error("remote command could not be started: {message}")]
    Exec {
        /// Description of the failure.
        message: String,
    },
    /// The remote command outlived its deadline.
    #[error("remote command timed out after {}s", .after.as_secs())]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
        /// Standard output received before the deadline.
        stdout: String,
        /// Standard error received before the deadline.
        stderr: String,
    },
    /// The session itself is no longer usable.
    #[error("remote session failed: {message}")]
    Fault {
        /// Description of the failure.
        message: String,
    },
}

impl SessionError {
    /// Builds a [`SessionError::Transfer`] for `path`.
    pub fn transfer(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Builds a [`SessionError::Fault`].
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
        }
    }

    /// Returns `true` when the session can no longer be used.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }
}
