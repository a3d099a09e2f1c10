//! Sequential driver that applies events over one remote session.
//!
//! A [`Runner`] connects once, applies its events strictly in order, and
//! closes the session on every path that got past connecting. Transfer
//! failures and timeouts are recorded on the event that hit them; only a
//! session fault, an explicit stop, or cancellation ends the run early.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::{CopiedPaths, Event};
use crate::session::{ConnectionError, ConnectionTarget, Connector, RemoteSession, SessionError};

/// Errors that end a run before every event has been applied.
#[derive(Debug, Error)]
pub enum RunError {
    /// The session could not be opened. No event was applied.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The session became unusable while applying an event.
    #[error("session failed during event {index}: {source}")]
    SessionFault {
        /// Position of the event that hit the fault.
        index: usize,
        /// Fault reported by the session.
        #[source]
        source: SessionError,
    },
    /// An event failed and the runner was told not to continue.
    #[error("stopped after event {index} failed: {message}")]
    Stopped {
        /// Position of the failed event.
        index: usize,
        /// Error recorded on the failed event.
        message: String,
    },
    /// The cancellation token fired between events.
    #[error("run cancelled before event {next}")]
    Cancelled {
        /// Position of the first event that was not applied.
        next: usize,
    },
}

/// Knobs that shape a run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Keep going after an event records a failure. Defaults to `true`.
    pub continue_on_error: bool,
    /// Deadline applied to execute events that have none of their own.
    pub command_timeout: Option<Duration>,
    /// Token checked before each event.
    pub cancel: Option<CancellationToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RunOptions {
    /// Best-effort options: continue on error, no timeout, no cancellation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            continue_on_error: true,
            command_timeout: None,
            cancel: None,
        }
    }

    /// Sets whether a failed event stops the run.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Sets the default command deadline.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Applies an ordered list of events over a single session.
#[derive(Debug)]
pub struct Runner<C: Connector> {
    connector: C,
    target: ConnectionTarget,
    events: Vec<Event>,
    copied: CopiedPaths,
    options: RunOptions,
}

impl<C: Connector> Runner<C> {
    /// Creates a runner with default [`RunOptions`].
    pub fn new(connector: C, target: ConnectionTarget, events: Vec<Event>) -> Self {
        Self {
            connector,
            target,
            events,
            copied: CopiedPaths::new(),
            options: RunOptions::new(),
        }
    }

    /// Replaces the run options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Events in their original order, with whatever results are recorded.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consumes the runner, returning its events.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Remote paths uploaded and not yet deleted.
    #[must_use]
    pub const fn copied_paths(&self) -> &CopiedPaths {
        &self.copied
    }

    /// Connection target of this runner.
    #[must_use]
    pub const fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Connects, applies every event in order, and closes the session.
    ///
    /// Running again clears every recorded result before connecting. Paths
    /// uploaded by an earlier run stay tracked for the next cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Connection`] when the session cannot be opened,
    /// [`RunError::SessionFault`] when it breaks mid-run,
    /// [`RunError::Stopped`] when an event fails and
    /// `continue_on_error` is off, and [`RunError::Cancelled`] when the
    /// token fires. Events applied before the error keep their results.
    pub async fn run(&mut self) -> Result<&[Event], RunError> {
        self.events.iter_mut().for_each(Event::clear_result);
        info!(target = %self.target, events = self.events.len(), "connecting");
        let session = self.connector.connect(&self.target).await?;
        debug!(target = %self.target, "session open");

        let outcome = self.apply_all(&session).await;

        if let Err(err) = session.close().await {
            warn!(target = %self.target, error = %err, "closing session failed");
        }
        outcome.map(|()| self.events.as_slice())
    }

    async fn apply_all(&mut self, session: &C::Session) -> Result<(), RunError> {
        let Self {
            events,
            copied,
            options,
            ..
        } = self;

        for (index, event) in events.iter_mut().enumerate() {
            if let Some(token) = &options.cancel
                && token.is_cancelled()
            {
                warn!(next = index, "run cancelled");
                return Err(RunError::Cancelled { next: index });
            }

            debug!(index, event = %event.describe(), "applying");
            event
                .apply(session, copied, options.command_timeout)
                .await
                .map_err(|source| RunError::SessionFault { index, source })?;

            if let Some(result) = event.result()
                && result.did_fail()
            {
                let message = result.error.clone().unwrap_or_default();
                warn!(index, kind = %event.kind(), error = %message, "event failed");
                if !options.continue_on_error {
                    return Err(RunError::Stopped { index, message });
                }
            }
        }
        Ok(())
    }
}
