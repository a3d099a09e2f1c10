//! Where to connect and how to authenticate.

use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;

/// Port used when none is configured.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Credential handed to the SSH library during authentication.
#[derive(Clone, Default, Eq, PartialEq)]
pub enum Credential {
    /// Attempt the `none` method, for hosts that need no credential.
    #[default]
    None,
    /// Password authentication.
    Password(String),
    /// Public key authentication with a private key file.
    KeyFile {
        /// Path to the private key.
        path: Utf8PathBuf,
        /// Passphrase protecting the key, if any.
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// How the server's host key is checked.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents.
    #[default]
    AcceptAny,
    /// Require the key to match an entry in the given `known_hosts` file.
    KnownHosts(Utf8PathBuf),
}

/// Connection parameters for one remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionTarget {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port of the SSH server.
    pub port: u16,
    /// Remote user name.
    pub user: String,
    /// Credential used to authenticate.
    pub credential: Credential,
    /// Host key verification policy.
    pub host_key_policy: HostKeyPolicy,
    /// Upper bound on connect plus handshake, if any.
    pub connect_timeout: Option<Duration>,
}

impl ConnectionTarget {
    /// Creates a target on [`DEFAULT_SSH_PORT`] that accepts any host key.
    pub fn new(host: impl Into<String>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            credential,
            host_key_policy: HostKeyPolicy::AcceptAny,
            connect_timeout: None,
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the host key policy.
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Bounds the time spent connecting.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}
