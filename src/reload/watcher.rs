//! File watching for configuration sources.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_stream::Stream;

use super::ReloadEvent;
use crate::error::WatchError;

/// Source of change events for configuration files.
///
/// # Stream Items
///
/// Each call to [`ConfigWatcher::watch`] returns an independent stream of
/// events for one path, in the order the backend observed them. Runtime
/// failures are delivered in-band as [`ReloadEvent::WatchError`]. Dropping
/// the stream stops watching the path.
pub trait ConfigWatcher: Send + Sync {
    /// The stream type returned by `watch`.
    type Stream: Stream<Item = ReloadEvent> + Send + Unpin + 'static;

    /// Starts watching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Setup`] if the backend cannot watch the path.
    fn watch(&self, path: &Path) -> Result<Self::Stream, WatchError>;
}

/// Watcher backed by the platform's recommended `notify` backend.
///
/// The file's parent directory is watched so that editors which replace a
/// file by renaming a temporary over it are still observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyWatcher;

impl ConfigWatcher for NotifyWatcher {
    type Stream = WatchStream;

    fn watch(&self, path: &Path) -> Result<Self::Stream, WatchError> {
        let setup_error = |reason: String| WatchError::Setup {
            path: path.to_path_buf(),
            reason,
        };

        let absolute = std::path::absolute(path).map_err(|e| setup_error(e.to_string()))?;
        let file_name = absolute
            .file_name()
            .ok_or_else(|| setup_error("path has no file name".to_string()))?
            .to_os_string();
        let directory = absolute
            .parent()
            .ok_or_else(|| setup_error("path has no parent directory".to_string()))?
            .to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        let reported = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => classify(&event.kind, &event.paths, &file_name, &reported),
                Err(e) => Some(ReloadEvent::WatchError {
                    path: reported.clone(),
                    cause: WatchError::Backend(e.to_string()),
                }),
            };
            if let Some(event) = event {
                // Receiver gone means the stream was dropped
                let _ = tx.send(event);
            }
        })
        .map_err(|e| setup_error(e.to_string()))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| setup_error(e.to_string()))?;

        tracing::debug!(file = %path.display(), directory = %directory.display(), "Watching config file");
        Ok(WatchStream {
            rx,
            _watcher: watcher,
        })
    }
}

/// Event stream returned by [`NotifyWatcher`].
///
/// Owns the backend watcher; dropping the stream stops it.
pub struct WatchStream {
    rx: mpsc::UnboundedReceiver<ReloadEvent>,
    _watcher: RecommendedWatcher,
}

impl Stream for WatchStream {
    type Item = ReloadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream").finish_non_exhaustive()
    }
}

/// Maps a backend event in the watched directory to a reload event.
///
/// Only events touching `file_name` are kept; `reported` is the path the
/// resulting event carries.
pub(crate) fn classify(
    kind: &EventKind,
    paths: &[PathBuf],
    file_name: &OsStr,
    reported: &Path,
) -> Option<ReloadEvent> {
    let touches = |p: &PathBuf| p.file_name() == Some(file_name);
    let changed = || Some(ReloadEvent::Changed(reported.to_path_buf()));
    let removed = || Some(ReloadEvent::Removed(reported.to_path_buf()));

    if !paths.iter().any(touches) {
        return None;
    }

    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => removed(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths are [from, to]
            if paths.get(1).is_some_and(touches) {
                changed()
            } else {
                removed()
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) | EventKind::Other => {
            None
        }
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => changed(),
        EventKind::Remove(_) => removed(),
    }
}
