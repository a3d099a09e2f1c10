//! JSON plan files describing an ordered event list.
//!
//! ```json
//! { "events": [
//!     { "kind": "copy_to_remote", "local": "build/app.tar.gz" },
//!     { "kind": "execute", "command": "tar xzf app.tar.gz", "timeout_secs": 30 },
//!     { "kind": "copy_from_remote", "remote": "app.log", "local": "app.log" },
//!     { "kind": "delete_all_copied_to_remote" }
//! ] }
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::event::{Event, default_remote_path};

/// Errors raised while reading a plan.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PlanError {
    /// The plan file could not be read.
    #[error("failed to read plan {path}: {message}")]
    Read {
        /// Plan file path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// The plan is not valid JSON of the expected shape.
    #[error("failed to parse plan: {0}")]
    Parse(String),
    /// An entry is well-formed JSON but cannot become an event.
    #[error("plan event {index} is invalid: {message}")]
    Invalid {
        /// Zero-based position of the entry.
        index: usize,
        /// What is wrong with it.
        message: String,
    },
}

/// Parsed plan file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Entries in execution order.
    pub events: Vec<PlanEvent>,
}

/// One entry of a plan.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PlanEvent {
    /// Run a remote command.
    Execute {
        /// Command line.
        command: String,
        /// Deadline in seconds.
        #[serde(default)]
        timeout_secs: Option<u64>,
        /// Remote working directory.
        #[serde(default)]
        working_dir: Option<String>,
    },
    /// Upload a file or directory.
    CopyToRemote {
        /// Local source path.
        local: Utf8PathBuf,
        /// Remote destination; defaults to the local file name.
        #[serde(default)]
        remote: Option<String>,
    },
    /// Download a file.
    CopyFromRemote {
        /// Remote source path.
        remote: String,
        /// Local destination path.
        local: Utf8PathBuf,
    },
    /// Delete every file uploaded so far.
    DeleteAllCopiedToRemote,
}

impl Plan {
    /// Parses a plan from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Parse`] when the text does not match the plan
    /// schema.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        serde_json::from_str(text).map_err(|err| PlanError::Parse(err.to_string()))
    }

    /// Reads and parses the plan at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Read`] when the file cannot be read and
    /// [`PlanError::Parse`] when it is malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path).map_err(|err| PlanError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Converts the plan into runnable events.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Invalid`] for an empty command, a zero timeout,
    /// or an upload whose remote path cannot be derived.
    pub fn into_events(self) -> Result<Vec<Event>, PlanError> {
        self.events
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_event(index))
            .collect()
    }
}

impl PlanEvent {
    fn into_event(self, index: usize) -> Result<Event, PlanError> {
        let invalid = |message: &str| PlanError::Invalid {
            index,
            message: message.to_owned(),
        };

        match self {
            Self::Execute {
                command,
                timeout_secs,
                working_dir,
            } => {
                if command.trim().is_empty() {
                    return Err(invalid("command must not be empty"));
                }
                let mut event = Event::execute(command);
                match timeout_secs {
                    Some(0) => return Err(invalid("timeout_secs must be greater than zero")),
                    Some(secs) => event = event.with_timeout(Duration::from_secs(secs)),
                    None => {}
                }
                if let Some(dir) = working_dir {
                    event = event.with_working_dir(dir);
                }
                Ok(event)
            }
            Self::CopyToRemote { local, remote } => {
                let destination = match remote {
                    Some(path) => path,
                    None => default_remote_path(&local).ok_or_else(|| {
                        invalid("remote is required when local has no file name")
                    })?,
                };
                Ok(Event::copy_to_remote(local, destination))
            }
            Self::CopyFromRemote { remote, local } => Ok(Event::copy_from_remote(remote, local)),
            Self::DeleteAllCopiedToRemote => Ok(Event::delete_all_copied_to_remote()),
        }
    }
}
