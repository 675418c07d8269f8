//! Reload notifications.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast;

use super::ReloadEvent;
use crate::error::{ReloadError, ValidationError};
use crate::snapshot::Snapshot;

/// Callback invoked once per reload attempt with the triggering event and,
/// on rollback, the cause.
pub type OnChange = Arc<dyn Fn(&ReloadEvent, Option<&ReloadError>) + Send + Sync>;

/// Callback invoked whenever a candidate snapshot fails schema validation.
pub type OnValidationError = Arc<dyn Fn(&Snapshot, &ValidationError) + Send + Sync>;

/// Result of one reload attempt.
#[derive(Debug, Clone)]
pub struct ReloadNotification {
    /// The event that triggered the attempt.
    pub event: ReloadEvent,
    /// Why the attempt did not commit; `None` on success.
    pub error: Option<Arc<ReloadError>>,
    /// When the decision was made.
    pub at: SystemTime,
}

impl ReloadNotification {
    /// Returns true if the attempt committed a new snapshot.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fan-out of reload notifications to a callback and broadcast subscribers.
pub struct Notifier {
    sender: broadcast::Sender<ReloadNotification>,
    on_change: Option<OnChange>,
}

impl Notifier {
    /// Creates a notifier whose channel buffers `capacity` notifications
    /// per subscriber.
    #[must_use]
    pub fn new(capacity: usize, on_change: Option<OnChange>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, on_change }
    }

    /// Subscribes to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadNotification> {
        self.sender.subscribe()
    }

    /// Delivers `notification` to the callback, then to every subscriber.
    pub fn notify(&self, notification: ReloadNotification) {
        if let Some(on_change) = &self.on_change {
            on_change(&notification.event, notification.error.as_deref());
        }
        // No subscribers is not an error
        let _ = self.sender.send(notification);
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.sender.receiver_count())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}
