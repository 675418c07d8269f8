//! Debounce policy for reload event streams.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};
use tokio_stream::Stream;

use super::ReloadEvent;
use crate::defaults::debounce_window;

/// Policy for debouncing file-change events.
///
/// Editors often write a file in several steps (truncate, write, rename),
/// producing a burst of events for one logical change. Debouncing merges
/// the burst so the coordinator rebuilds once.
///
/// # Merge Semantics
///
/// | Scenario | Event Sequence in Window | Output |
/// |----------|--------------------------|--------|
/// | Burst | `Changed → Changed → Changed` | One `Changed` |
/// | Replace | `Removed → Changed` | `Changed` |
/// | Delete | `Changed → Removed` | `Removed` |
/// | Failure | `Changed → WatchError` | `Changed`, then `WatchError` immediately |
///
/// The latest file event wins and is emitted once the stream has been quiet
/// for the whole window. Watch errors are never delayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    window: Duration,
}

impl DebouncePolicy {
    /// Creates a new debounce policy with the specified window duration.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Returns the debounce window duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Wraps `stream` so its events are debounced by this policy.
    #[must_use]
    pub fn apply<S>(&self, stream: S) -> Debounced<S> {
        Debounced::new(stream, self.window)
    }
}

impl Default for DebouncePolicy {
    /// Creates a default debounce policy with a 100-millisecond window.
    fn default() -> Self {
        Self::new(debounce_window())
    }
}

/// Stream adapter produced by [`DebouncePolicy::apply`].
///
/// A pending event is flushed when the inner stream ends.
#[derive(Debug)]
pub struct Debounced<S> {
    inner: S,
    window: Duration,
    pending: Option<ReloadEvent>,
    ready: VecDeque<ReloadEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl<S> Debounced<S> {
    fn new(inner: S, window: Duration) -> Self {
        Self {
            inner,
            window,
            pending: None,
            ready: VecDeque::new(),
            sleep: None,
            finished: false,
        }
    }

    fn hold(&mut self, event: ReloadEvent) {
        self.pending = Some(event);
        let deadline = Instant::now() + self.window;
        match &mut self.sleep {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }
}

impl<S> Stream for Debounced<S>
where
    S: Stream<Item = ReloadEvent> + Unpin,
{
    type Item = ReloadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.finished {
                return Poll::Ready(this.pending.take());
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(event)) if event.is_watch_error() => {
                    this.ready.extend(this.pending.take());
                    this.ready.push_back(event);
                }
                Poll::Ready(Some(event)) if this.window.is_zero() => {
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(Some(event)) => this.hold(event),
                Poll::Ready(None) => this.finished = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_some() {
            if let Some(sleep) = &mut this.sleep {
                if sleep.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(this.pending.take());
                }
            }
        }
        Poll::Pending
    }
}
