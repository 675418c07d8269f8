//! Immutable configuration snapshots.
//!
//! A [`Snapshot`] is the merge of every layer at one point in time. The
//! [`Pipeline`] assembles the layers from the current state of all sources;
//! [`LiveSnapshot`] holds the snapshot currently served to readers.

mod accessors;
mod live;
mod pipeline;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use live::{Commit, LiveSnapshot};
pub use pipeline::Pipeline;

use crate::layer::Layer;
use crate::value::{Map, Value, insert_path, leaf_paths, merge_maps};

/// The fully merged configuration at one instant.
///
/// Snapshots are never mutated after construction; overrides produce a new
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: Map,
}

impl Snapshot {
    /// Merges `layers` left to right into a snapshot.
    ///
    /// Later layers win. Nested maps merge key by key; lists and scalars are
    /// replaced wholesale. No validation is performed.
    #[must_use]
    pub fn build(layers: &[Layer]) -> Self {
        let mut values = Map::new();
        for layer in layers {
            merge_maps(&mut values, layer.values().clone());
        }
        Self { values }
    }

    /// Wraps an already merged map.
    #[must_use]
    pub const fn from_map(values: Map) -> Self {
        Self { values }
    }

    /// Looks up a value by dotted key path.
    ///
    /// Explicit nulls are reported as absent.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let (first, rest) = path.split_once('.').unwrap_or((path, ""));
        self.values
            .get(first)
            .and_then(|v| v.lookup(rest))
            .filter(|v| !v.is_null())
    }

    /// Returns true if `path` resolves to a non-null value.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns the dotted paths of every non-null leaf, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        leaf_paths(&self.values, "", &mut keys);
        keys.retain(|k| self.exists(k));
        keys
    }

    /// Returns the merged tree.
    #[must_use]
    pub const fn values(&self) -> &Map {
        &self.values
    }

    /// Returns a copy with `value` layered at `path`.
    #[must_use]
    pub fn with_override(&self, path: &str, value: Value) -> Self {
        let mut values = self.values.clone();
        insert_path(&mut values, path, value);
        Self { values }
    }

    /// Marshals the snapshot to a JSON document.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Marshals the snapshot to compact JSON bytes.
    ///
    /// Keys are sorted, so equal snapshots produce identical bytes.
    #[must_use]
    pub fn to_json_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}
