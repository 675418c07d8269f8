//! Immutable-key guard.

use crate::error::ImmutableViolation;
use crate::snapshot::Snapshot;

/// Key paths that must keep their value across every reload.
///
/// Fixed at construction; duplicates are dropped and order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImmutableKeySet {
    keys: Vec<String>,
}

impl ImmutableKeySet {
    /// Creates a key set from dotted paths.
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            if !key.is_empty() && !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self { keys: unique }
    }

    /// Returns the keys in declaration order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns true if no key is protected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks that no protected key differs between `old` and `new`.
    ///
    /// # Errors
    ///
    /// Returns the first differing key in declaration order.
    pub fn check(&self, old: &Snapshot, new: &Snapshot) -> Result<(), ImmutableViolation> {
        check(old, new, self)
    }
}

/// Compares `old` and `new` on every key of `keys`.
///
/// A key absent from both snapshots is not a violation.
///
/// # Errors
///
/// Returns the first key, in set order, whose values differ.
pub fn check(
    old: &Snapshot,
    new: &Snapshot,
    keys: &ImmutableKeySet,
) -> Result<(), ImmutableViolation> {
    for key in keys.keys() {
        let before = old.get(key);
        let after = new.get(key);
        if before != after {
            return Err(ImmutableViolation {
                key: key.clone(),
                old: before.cloned(),
                new: after.cloned(),
            });
        }
    }
    Ok(())
}
