//! Per-path reload state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};

use super::{Notifier, OnValidationError, ReloadEvent, ReloadNotification};
use crate::error::{ReloadError, WatchError};
use crate::guard::ImmutableKeySet;
use crate::schema::Validator;
use crate::snapshot::{Commit, LiveSnapshot, Pipeline, Snapshot};
use crate::time::Clock;

/// Everything a coordinator needs to rebuild and commit.
///
/// Shared between the provider and all of its coordinators.
pub struct ReloadContext {
    pub(crate) pipeline: Pipeline,
    pub(crate) validator: Validator,
    pub(crate) immutables: ImmutableKeySet,
    pub(crate) live: LiveSnapshot,
    pub(crate) notifier: Notifier,
    pub(crate) on_validation_error: Option<OnValidationError>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ReloadContext {
    /// Validates `candidate`, invoking the validation hook on failure.
    pub(crate) fn validate(&self, candidate: &Snapshot) -> Result<(), crate::error::ValidationError> {
        self.validator.validate(candidate).inspect_err(|err| {
            if let Some(hook) = &self.on_validation_error {
                hook(candidate, err);
            }
        })
    }

    fn notify(&self, event: ReloadEvent, error: Option<ReloadError>) {
        self.notifier.notify(ReloadNotification {
            event,
            error: error.map(Arc::new),
            at: self.clock.now(),
        });
    }
}

impl fmt::Debug for ReloadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadContext")
            .field("pipeline", &self.pipeline)
            .field("immutables", &self.immutables)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Where a coordinator is in handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Waiting for the next event.
    Watching,
    /// Re-running the layer pipeline.
    Rebuilding,
    /// Storing a validated candidate.
    Committing,
    /// Discarding a rejected candidate.
    RollingBack,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Watching => "watching",
            Self::Rebuilding => "rebuilding",
            Self::Committing => "committing",
            Self::RollingBack => "rolling back",
        })
    }
}

/// What handling one event did.
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// A new snapshot was committed.
    Committed,
    /// The candidate was discarded; the live snapshot is unchanged.
    RolledBack(Arc<ReloadError>),
    /// A watch error was reported; no rebuild was attempted.
    Reported(WatchError),
    /// Watching was stopped before the candidate could be committed.
    Cancelled,
}

/// Reload state machine for one watched path.
///
/// Strictly sequential: each event is fully resolved, including its
/// notification, before the next one is taken from the stream.
pub struct ReloadCoordinator {
    path: PathBuf,
    context: Arc<ReloadContext>,
    cancel: watch::Receiver<bool>,
    state: ReloadState,
}

impl ReloadCoordinator {
    /// Creates a coordinator for `path`.
    ///
    /// Setting `cancel` to `true` stops the coordinator; no commit happens
    /// after that point.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        context: Arc<ReloadContext>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            path: path.into(),
            context,
            cancel,
            state: ReloadState::Watching,
        }
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ReloadState {
        self.state
    }

    /// Consumes `events` until the stream ends or cancellation is requested.
    pub async fn run<S>(mut self, mut events: S)
    where
        S: Stream<Item = ReloadEvent> + Unpin,
    {
        tracing::debug!(file = %self.path.display(), "Reload coordinator started");
        loop {
            if self.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;

                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        // Sender dropped: the provider is gone
                        break;
                    }
                }

                event = events.next() => {
                    let Some(event) = event else {
                        tracing::debug!(file = %self.path.display(), "Watch stream ended");
                        break;
                    };
                    self.handle(event);
                }
            }
        }
        tracing::debug!(file = %self.path.display(), "Reload coordinator stopped");
    }

    /// Fully resolves one event.
    pub fn handle(&mut self, event: ReloadEvent) -> ReloadOutcome {
        let outcome = match event {
            ReloadEvent::WatchError { path, cause } => {
                tracing::error!(
                    file = %self.path.display(),
                    event = "watch_error",
                    error = %cause,
                    "Config file watcher reported an error"
                );
                let error = ReloadError::Watch(cause.clone());
                let event = ReloadEvent::WatchError {
                    path,
                    cause: cause.clone(),
                };
                self.context.notify(event, Some(error));
                ReloadOutcome::Reported(cause)
            }
            event @ (ReloadEvent::Changed(_) | ReloadEvent::Removed(_)) => {
                tracing::info!(
                    file = %self.path.display(),
                    event = event.kind(),
                    "Config file change detected, reloading"
                );
                self.reload(event)
            }
        };
        self.transition(ReloadState::Watching);
        outcome
    }

    fn reload(&mut self, event: ReloadEvent) -> ReloadOutcome {
        self.transition(ReloadState::Rebuilding);
        let candidate = match self.context.pipeline.build() {
            Ok(candidate) => candidate,
            Err(err) => return self.roll_back(event, ReloadError::Load(err)),
        };

        if let Err(err) = self.context.validate(&candidate) {
            return self.roll_back(event, ReloadError::Validation(err));
        }

        self.transition(ReloadState::Committing);
        let context = Arc::clone(&self.context);
        let cancel = self.cancel.clone();
        let commit = context.live.commit(
            candidate,
            || *cancel.borrow(),
            |live, candidate| context.immutables.check(live, candidate),
        );

        match commit {
            Commit::Applied => {
                tracing::info!(
                    file = %self.path.display(),
                    event = event.kind(),
                    "Config file changed, new configuration applied"
                );
                context.notify(event, None);
                ReloadOutcome::Committed
            }
            Commit::Rejected(violation) => {
                tracing::error!(
                    file = %self.path.display(),
                    key = %violation.key,
                    old_value = ?violation.old,
                    new_value = ?violation.new,
                    "Immutable configuration key changed, keeping current configuration"
                );
                self.roll_back(event, ReloadError::Immutable(violation))
            }
            Commit::Cancelled => {
                tracing::debug!(file = %self.path.display(), "Watching stopped, candidate discarded");
                ReloadOutcome::Cancelled
            }
        }
    }

    fn roll_back(&mut self, event: ReloadEvent, error: ReloadError) -> ReloadOutcome {
        self.transition(ReloadState::RollingBack);
        tracing::error!(
            file = %self.path.display(),
            event = event.kind(),
            error = %error,
            "Config reload failed, rolling back to previous configuration"
        );
        let error = Arc::new(error);
        self.context.notifier.notify(ReloadNotification {
            event,
            error: Some(Arc::clone(&error)),
            at: self.context.clock.now(),
        });
        ReloadOutcome::RolledBack(error)
    }

    fn transition(&mut self, next: ReloadState) {
        if self.state != next {
            tracing::trace!(file = %self.path.display(), from = %self.state, to = %next, "Reload state");
            self.state = next;
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

impl fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("path", &self.path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
