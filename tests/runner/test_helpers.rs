//! Shared fixtures for runner BDD scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use crrunner::test_support::{ScriptedConnector, ScriptedSession};
use crrunner::{ConnectionTarget, Credential, Event, EventStatus, RunError, RunOptions};
use rstest::fixture;
use tempfile::TempDir;

#[derive(Clone, Debug)]
pub struct RunContext {
    pub session: ScriptedSession,
    pub connector: ScriptedConnector,
    pub options: RunOptions,
    pub events: Vec<Event>,
    pub local_root: Utf8PathBuf,
    pub outcome: Option<RunOutcome>,
    pub(super) _local_tmp: Arc<TempDir>,
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub events: Vec<Event>,
    pub failure: Option<String>,
    pub copied_left: usize,
}

impl RunContext {
    pub fn with_connector(self, connector: ScriptedConnector) -> Self {
        Self { connector, ..self }
    }

    pub fn with_events(self, events: Vec<Event>) -> Self {
        Self { events, ..self }
    }

    pub fn with_options(self, options: RunOptions) -> Self {
        Self { options, ..self }
    }

    pub fn write_local(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.local_root.join(name);
        std::fs::write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
        path
    }
}

#[fixture]
pub fn run_context() -> RunContext {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("create local temp dir: {err}"));
    let local_root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir is not UTF-8: {}", path.display()));
    let session = ScriptedSession::new();

    RunContext {
        connector: ScriptedConnector::new(session.clone()),
        session,
        options: RunOptions::new(),
        events: Vec::new(),
        local_root,
        outcome: None,
        _local_tmp: Arc::new(tmp),
    }
}

pub fn target() -> ConnectionTarget {
    ConnectionTarget::new("192.0.2.44", "runner", Credential::Password(String::from("secret")))
}

pub const fn failure_label(err: &RunError) -> &'static str {
    match err {
        RunError::Connection(_) => "connection",
        RunError::SessionFault { .. } => "session fault",
        RunError::Stopped { .. } => "stopped",
        RunError::Cancelled { .. } => "cancelled",
    }
}

pub fn parse_status(label: &str) -> Option<EventStatus> {
    match label {
        "succeeded" => Some(EventStatus::Succeeded),
        "failed" => Some(EventStatus::Failed),
        "timed_out" => Some(EventStatus::TimedOut),
        _ => None,
    }
}
