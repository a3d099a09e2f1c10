//! Core library for the crrunner remote event runner.
//!
//! A [`Runner`] opens one SSH session to a remote host, applies an ordered
//! list of [`Event`]s over it (run a command, upload, download, delete what
//! was uploaded), and records a result on each. Plans can be loaded from
//! JSON files with [`Plan`], and connection settings from `crrunner.toml`
//! and `CRRUNNER_*` variables with [`RunnerConfig`].

pub mod config;
pub mod event;
pub mod logging;
pub mod plan;
pub mod report;
pub mod runner;
pub mod session;
pub mod test_support;
pub mod util;

pub use config::{ConfigError, RunnerConfig};
pub use event::{
    Action, CopiedPaths, CopyFromRemoteEvent, CopyToRemoteEvent, Event, EventKind, EventResult,
    EventStatus, ExecuteEvent,
};
pub use plan::{Plan, PlanError, PlanEvent};
pub use runner::{RunError, RunOptions, Runner};
pub use session::{
    CommandOutput, ConnectionError, ConnectionTarget, Connector, Credential, DEFAULT_SSH_PORT,
    HostKeyPolicy, RemoteSession, SessionError, SshConnector, SshSession,
};
