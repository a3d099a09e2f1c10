//! `russh`-backed session.
//!
//! Commands run on their own exec channel; file transfers share one SFTP
//! subsystem channel opened right after authentication. Whether an error is a
//! session fault is decided by asking the connection handle if it is still
//! open.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use russh::client::{self, AuthResult, Handle, Handler, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{
    CommandOutput, ConnectFuture, ConnectionError, ConnectionTarget, Connector, Credential,
    HostKeyPolicy, RemoteSession, SessionError, SessionFuture,
};

/// SSH extended data type carrying standard error.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Connector that opens real SSH sessions.
#[derive(Clone, Debug)]
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl SshConnector {
    /// Creates a connector using the supplied `russh` client configuration.
    #[must_use]
    pub fn new(config: client::Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(client::Config::default())
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect<'a>(&'a self, target: &'a ConnectionTarget) -> ConnectFuture<'a, SshSession> {
        Box::pin(async move {
            let label = target.to_string();
            let checker = HostKeyCheck {
                host: target.host.clone(),
                port: target.port,
                policy: target.host_key_policy.clone(),
            };
            let connecting = client::connect(
                Arc::clone(&self.config),
                (target.host.as_str(), target.port),
                checker,
            );
            let connected = match target.connect_timeout {
                Some(limit) => {
                    timeout(limit, connecting)
                        .await
                        .map_err(|_| ConnectionError::Timeout {
                            target: label.clone(),
                            after: limit,
                        })?
                }
                None => connecting.await,
            };
            let mut handle = connected.map_err(|err| connect_error(&label, &err))?;

            authenticate(&mut handle, target, &label).await?;
            debug!(target = %label, "authenticated");

            let sftp = open_sftp(&handle)
                .await
                .map_err(|message| ConnectionError::Connect {
                    target: label.clone(),
                    message,
                })?;

            Ok(SshSession { handle, sftp })
        })
    }
}

/// Authenticated SSH connection with an SFTP channel attached.
pub struct SshSession {
    handle: Handle<HostKeyCheck>,
    sftp: SftpSession,
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("closed", &self.handle.is_closed())
            .finish_non_exhaustive()
    }
}

impl SshSession {
    fn classify(&self, path: &str, err: impl Display) -> SessionError {
        if self.handle.is_closed() {
            SessionError::fault(err.to_string())
        } else {
            SessionError::transfer(path, err.to_string())
        }
    }

    fn exec_error(&self, err: impl Display) -> SessionError {
        if self.handle.is_closed() {
            SessionError::fault(err.to_string())
        } else {
            SessionError::Exec {
                message: err.to_string(),
            }
        }
    }
}

impl RemoteSession for SshSession {
    fn exec<'a>(
        &'a self,
        command: &'a str,
        limit: Option<Duration>,
    ) -> SessionFuture<'a, CommandOutput> {
        Box::pin(async move {
            let mut channel = self
                .handle
                .channel_open_session()
                .await
                .map_err(|err| self.exec_error(err))?;
            channel
                .exec(true, command)
                .await
                .map_err(|err| self.exec_error(err))?;

            let mut collected = Collected::default();
            let finished = match limit {
                Some(after) => timeout(after, drain(&mut channel, &mut collected))
                    .await
                    .is_ok(),
                None => {
                    drain(&mut channel, &mut collected).await;
                    true
                }
            };

            if !finished {
                if let Err(err) = channel.close().await {
                    debug!(error = %err, "closing timed out channel failed");
                }
                let (stdout, stderr) = collected.into_streams();
                return Err(SessionError::Timeout {
                    after: limit.unwrap_or_default(),
                    stdout,
                    stderr,
                });
            }

            if collected.exit_code.is_none() && self.handle.is_closed() {
                return Err(SessionError::fault(
                    "connection closed before the command reported an exit status",
                ));
            }

            let exit_code = collected.exit_code;
            let (stdout, stderr) = collected.into_streams();
            Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
            })
        })
    }

    fn upload_file<'a>(&'a self, local: &'a Utf8Path, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let contents = tokio::fs::read(local)
                .await
                .map_err(|err| SessionError::transfer(local.as_str(), err.to_string()))?;
            let mut file = self
                .sftp
                .open_with_flags(
                    remote,
                    OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                )
                .await
                .map_err(|err| self.classify(remote, err))?;
            file.write_all(&contents)
                .await
                .map_err(|err| self.classify(remote, err))?;
            file.flush().await.map_err(|err| self.classify(remote, err))?;
            file.shutdown()
                .await
                .map_err(|err| self.classify(remote, err))?;
            Ok(())
        })
    }

    fn make_dir<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            self.sftp
                .create_dir(remote)
                .await
                .map_err(|err| self.classify(remote, err))
        })
    }

    fn download_file<'a>(&'a self, remote: &'a str, local: &'a Utf8Path) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            let mut file = self
                .sftp
                .open_with_flags(remote, OpenFlags::READ)
                .await
                .map_err(|err| self.classify(remote, err))?;
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .await
                .map_err(|err| self.classify(remote, err))?;
            tokio::fs::write(local, contents)
                .await
                .map_err(|err| SessionError::transfer(local.as_str(), err.to_string()))
        })
    }

    fn delete_file<'a>(&'a self, remote: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            self.sftp
                .remove_file(remote)
                .await
                .map_err(|err| self.classify(remote, err))
        })
    }

    fn close(&self) -> SessionFuture<'_, ()> {
        Box::pin(async move {
            if let Err(err) = self.sftp.close().await {
                debug!(error = %err, "closing sftp channel failed");
            }
            if self.handle.is_closed() {
                return Ok(());
            }
            self.handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
                .map_err(|err| SessionError::fault(err.to_string()))
        })
    }
}

/// Host key verification hook handed to `russh`.
#[derive(Clone, Debug)]
struct HostKeyCheck {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => Ok(true),
            HostKeyPolicy::KnownHosts(path) => {
                match russh::keys::check_known_hosts_path(
                    &self.host,
                    self.port,
                    server_public_key,
                    path,
                ) {
                    Ok(known) => Ok(known),
                    Err(err) => {
                        warn!(host = %self.host, error = %err, "host key check failed");
                        Ok(false)
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Collected {
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Collected {
    fn into_streams(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

/// Reads channel messages until the server closes the channel.
async fn drain(channel: &mut Channel<Msg>, collected: &mut Collected) {
    while let Some(message) = channel.wait().await {
        match message {
            ChannelMsg::Data { ref data } => collected.stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                collected.stderr.extend_from_slice(data);
            }
            ChannelMsg::ExitStatus { exit_status } => {
                collected.exit_code = i32::try_from(exit_status).ok();
            }
            _ => {}
        }
    }
}

async fn authenticate(
    handle: &mut Handle<HostKeyCheck>,
    target: &ConnectionTarget,
    label: &str,
) -> Result<(), ConnectionError> {
    let user = target.user.clone();
    let outcome: Result<AuthResult, russh::Error> = match &target.credential {
        Credential::None => handle.authenticate_none(user).await,
        Credential::Password(password) => handle.authenticate_password(user, password).await,
        Credential::KeyFile { path, passphrase } => {
            let key = russh::keys::load_secret_key(path, passphrase.as_deref()).map_err(|err| {
                ConnectionError::KeyLoad {
                    path: path.clone(),
                    message: err.to_string(),
                }
            })?;
            let hash = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|err| connect_error(label, &err))?
                .flatten();
            handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash))
                .await
        }
    };

    let result = outcome.map_err(|err| connect_error(label, &err))?;
    if result.success() {
        Ok(())
    } else {
        Err(ConnectionError::AuthenticationFailed {
            target: label.to_owned(),
        })
    }
}

async fn open_sftp(handle: &Handle<HostKeyCheck>) -> Result<SftpSession, String> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|err| err.to_string())?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|err| err.to_string())?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|err| err.to_string())
}

fn connect_error(label: &str, err: &russh::Error) -> ConnectionError {
    match err {
        russh::Error::UnknownKey => ConnectionError::HostKeyRejected {
            target: label.to_owned(),
        },
        other => ConnectionError::Connect {
            target: label.to_owned(),
            message: other.to_string(),
        },
    }
}
