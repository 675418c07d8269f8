//! Hot reload of watched configuration files.
//!
//! - [`ConfigWatcher`]: turns a file path into a stream of [`ReloadEvent`]s
//! - [`DebouncePolicy`]: coalesces bursts of events per path
//! - [`ReloadCoordinator`]: rebuilds, validates, guards, then commits or
//!   rolls back, one event at a time
//! - [`Notifier`]: delivers one [`ReloadNotification`] per attempt

mod coordinator;
mod debounce;
mod notification;
mod watcher;

#[cfg(test)]
mod coordinator_tests;

pub use coordinator::{ReloadContext, ReloadCoordinator, ReloadOutcome, ReloadState};
pub use debounce::{DebouncePolicy, Debounced};
pub use notification::{Notifier, OnChange, OnValidationError, ReloadNotification};
pub use watcher::{ConfigWatcher, NotifyWatcher, WatchStream};

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::WatchError;

/// A change observed on a watched configuration source.
///
/// Events for one path are consumed strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// The file was created or modified.
    Changed(PathBuf),
    /// The file was removed or renamed away.
    Removed(PathBuf),
    /// The watcher failed for this path.
    WatchError {
        /// The watched path
        path: PathBuf,
        /// What went wrong
        cause: WatchError,
    },
}

impl ReloadEvent {
    /// Returns the watched path the event refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Changed(path) | Self::Removed(path) | Self::WatchError { path, .. } => path,
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Changed(_) => "changed",
            Self::Removed(_) => "removed",
            Self::WatchError { .. } => "watch_error",
        }
    }

    /// Returns true for [`ReloadEvent::WatchError`].
    #[must_use]
    pub const fn is_watch_error(&self) -> bool {
        matches!(self, Self::WatchError { .. })
    }
}

impl fmt::Display for ReloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path().display())
    }
}
