//! The snapshot currently served to readers.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use super::Snapshot;

/// Outcome of [`LiveSnapshot::commit`].
#[derive(Debug)]
pub enum Commit<E> {
    /// The candidate replaced the live snapshot.
    Applied,
    /// The guard rejected the candidate; the live snapshot is unchanged.
    Rejected(E),
    /// Cancellation was requested before the store; nothing changed.
    Cancelled,
}

/// Holder of the live snapshot.
///
/// Reads are lock-free and always observe a complete snapshot. Writers are
/// serialized by a gate so that a guard always compares against the
/// snapshot it is about to replace.
#[derive(Debug)]
pub struct LiveSnapshot {
    current: ArcSwap<Snapshot>,
    gate: Mutex<()>,
}

impl LiveSnapshot {
    /// Creates a holder serving `initial`.
    #[must_use]
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            gate: Mutex::new(()),
        }
    }

    /// Returns the live snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replaces the live snapshot with `candidate` if `guard` accepts it.
    ///
    /// `guard` receives the live snapshot and the candidate. `cancelled` is
    /// checked under the gate, so once it returns true no later commit
    /// through this call can land.
    pub fn commit<E>(
        &self,
        candidate: Snapshot,
        cancelled: impl FnOnce() -> bool,
        guard: impl FnOnce(&Snapshot, &Snapshot) -> Result<(), E>,
    ) -> Commit<E> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if cancelled() {
            return Commit::Cancelled;
        }
        let live = self.current.load();
        if let Err(err) = guard(&live, &candidate) {
            return Commit::Rejected(err);
        }
        self.current.store(Arc::new(candidate));
        tracing::trace!("Live snapshot replaced");
        Commit::Applied
    }

    /// Replaces the live snapshot with the snapshot `f` derives from it.
    ///
    /// `f` runs under the gate; an error leaves the live snapshot unchanged.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn try_update<E>(
        &self,
        f: impl FnOnce(&Snapshot) -> Result<Snapshot, E>,
    ) -> Result<(), E> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let next = f(&self.current.load())?;
        self.current.store(Arc::new(next));
        Ok(())
    }
}
