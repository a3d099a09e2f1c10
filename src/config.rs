//! Connection and run settings loaded via `ortho-config`.
//!
//! Values merge defaults, `crrunner.toml` (or `.crrunner.toml`, or the file
//! named by `CRRUNNER_CONFIG_PATH`), and `CRRUNNER_*` environment variables.
//! [`RunnerConfig::validate`] turns the merged values into actionable errors
//! before any connection is attempted.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::runner::RunOptions;
use crate::session::{ConnectionTarget, Credential, DEFAULT_SSH_PORT, HostKeyPolicy};
use crate::util::expand_tilde;

/// Settings for connecting to the remote host and shaping the run.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CRRUNNER",
    discovery(
        app_name = "crrunner",
        env_var = "CRRUNNER_CONFIG_PATH",
        config_file_name = "crrunner.toml",
        dotfile_name = ".crrunner.toml",
        project_file_name = "crrunner.toml"
    )
)]
pub struct RunnerConfig {
    /// Hostname or IP address of the remote machine. Required.
    pub host: Option<String>,
    /// SSH port. Defaults to 22.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub port: u16,
    /// Remote user to authenticate as.
    #[ortho_config(default = "root".to_owned())]
    pub user: String,
    /// Password for password authentication. Mutually exclusive with
    /// `identity_file`; with neither set the `none` method is tried.
    pub password: Option<String>,
    /// Private key for public key authentication. Supports tilde expansion.
    pub identity_file: Option<String>,
    /// Passphrase for an encrypted `identity_file`.
    pub identity_passphrase: Option<String>,
    /// `known_hosts` file used to verify the server. When unset any host key
    /// is accepted.
    pub known_hosts_file: Option<String>,
    /// Connect and handshake deadline in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Default deadline in seconds for commands that set none.
    pub command_timeout_secs: Option<u64>,
    /// Keep applying events after one fails.
    #[ortho_config(default = true)]
    pub continue_on_error: bool,
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Fields hold values that cannot be used together or at all.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to crrunner.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const HOST: FieldMetadata = FieldMetadata::new("remote host", "CRRUNNER_HOST", "host");
const USER: FieldMetadata = FieldMetadata::new("remote user", "CRRUNNER_USER", "user");
const PASSWORD: FieldMetadata = FieldMetadata::new("password", "CRRUNNER_PASSWORD", "password");
const IDENTITY_FILE: FieldMetadata =
    FieldMetadata::new("identity file", "CRRUNNER_IDENTITY_FILE", "identity_file");
const KNOWN_HOSTS_FILE: FieldMetadata = FieldMetadata::new(
    "known hosts file",
    "CRRUNNER_KNOWN_HOSTS_FILE",
    "known_hosts_file",
);

impl RunnerConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("crrunner")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that provide each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required or supplied
    /// field is blank and [`ConfigError::Invalid`] for conflicting or
    /// out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.host.as_deref().unwrap_or_default(), &HOST)?;
        require(&self.user, &USER)?;
        require_optional(self.password.as_deref(), &PASSWORD)?;
        require_optional(self.identity_file.as_deref(), &IDENTITY_FILE)?;
        require_optional(self.known_hosts_file.as_deref(), &KNOWN_HOSTS_FILE)?;

        if self.port == 0 {
            return Err(ConfigError::Invalid(String::from(
                "port must be between 1 and 65535",
            )));
        }
        if self.password.is_some() && self.identity_file.is_some() {
            return Err(ConfigError::Invalid(String::from(
                "set either password or identity_file, not both",
            )));
        }
        if self.identity_passphrase.is_some() && self.identity_file.is_none() {
            return Err(ConfigError::Invalid(String::from(
                "identity_passphrase requires identity_file",
            )));
        }
        for (value, key) in [
            (self.connect_timeout_secs, "connect_timeout_secs"),
            (self.command_timeout_secs, "command_timeout_secs"),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{key} must be greater than zero")));
            }
        }
        Ok(())
    }

    /// Credential implied by the password and identity settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        self.validate()?;
        let credential = match (&self.password, &self.identity_file) {
            (Some(password), _) => Credential::Password(password.clone()),
            (None, Some(path)) => Credential::KeyFile {
                path: expand_tilde(path),
                passphrase: self.identity_passphrase.clone(),
            },
            (None, None) => Credential::None,
        };
        Ok(credential)
    }

    /// Builds the connection target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn target(&self) -> Result<ConnectionTarget, ConfigError> {
        let credential = self.credential()?;
        let host = self.host.clone().ok_or_else(|| HOST.missing())?;

        let mut target = ConnectionTarget::new(host, self.user.clone(), credential)
            .with_port(self.port);
        if let Some(path) = &self.known_hosts_file {
            target = target.with_host_key_policy(HostKeyPolicy::KnownHosts(expand_tilde(path)));
        }
        if let Some(secs) = self.connect_timeout_secs {
            target = target.with_connect_timeout(Duration::from_secs(secs));
        }
        Ok(target)
    }

    /// Run options derived from this configuration.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new()
            .with_continue_on_error(self.continue_on_error)
            .with_command_timeout(self.command_timeout_secs.map(Duration::from_secs))
    }
}

fn require(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn require_optional(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    value.map_or(Ok(()), |present| require(present, metadata))
}
