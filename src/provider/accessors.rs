//! Typed reads from the live snapshot.
//!
//! Each call loads the live snapshot once and delegates to the matching
//! [`Snapshot`](crate::Snapshot) getter. To read several keys from the same
//! snapshot, hold [`Provider::snapshot`] and call the getters on it.

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::Provider;
use crate::value::Value;

impl Provider {
    /// Returns the value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot().get(key).cloned()
    }

    /// Returns the value at `key`, or `fallback`.
    #[must_use]
    pub fn get_f(&self, key: &str, fallback: impl Into<Value>) -> Value {
        self.snapshot().get_f(key, fallback)
    }

    /// Returns true if `key` is set to a non-null value.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.snapshot().exists(key)
    }

    /// Returns every leaf key path, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().keys()
    }

    /// Returns `key` as a string; non-string scalars are formatted.
    #[must_use]
    pub fn string(&self, key: &str) -> String {
        self.snapshot().string(key)
    }

    /// Returns `key` as a string, or `fallback`.
    #[must_use]
    pub fn string_f(&self, key: &str, fallback: &str) -> String {
        self.snapshot().string_f(key, fallback)
    }

    /// Returns `key` as a boolean.
    #[must_use]
    pub fn bool(&self, key: &str) -> bool {
        self.snapshot().bool(key)
    }

    /// Returns `key` as a boolean, or `fallback`.
    #[must_use]
    pub fn bool_f(&self, key: &str, fallback: bool) -> bool {
        self.snapshot().bool_f(key, fallback)
    }

    /// Returns `key` as an integer.
    #[must_use]
    pub fn int(&self, key: &str) -> i64 {
        self.snapshot().int(key)
    }

    /// Returns `key` as an integer, or `fallback`.
    #[must_use]
    pub fn int_f(&self, key: &str, fallback: i64) -> i64 {
        self.snapshot().int_f(key, fallback)
    }

    /// Returns `key` as a float.
    #[must_use]
    pub fn float64(&self, key: &str) -> f64 {
        self.snapshot().float64(key)
    }

    /// Returns `key` as a float, or `fallback`.
    #[must_use]
    pub fn float64_f(&self, key: &str, fallback: f64) -> f64 {
        self.snapshot().float64_f(key, fallback)
    }

    /// Returns `key` as a duration; numbers are seconds.
    #[must_use]
    pub fn duration(&self, key: &str) -> Duration {
        self.snapshot().duration(key)
    }

    /// Returns `key` as a duration, or `fallback`.
    #[must_use]
    pub fn duration_f(&self, key: &str, fallback: Duration) -> Duration {
        self.snapshot().duration_f(key, fallback)
    }

    /// Returns `key` as a list of strings.
    #[must_use]
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.snapshot().strings(key)
    }

    /// Returns `key` as a list of strings, or `fallback`.
    #[must_use]
    pub fn strings_f(&self, key: &str, fallback: Vec<String>) -> Vec<String> {
        self.snapshot().strings_f(key, fallback)
    }

    /// Deserializes the value at `key`; an empty key deserializes the whole
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the value does not match `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self, key: &str) -> Result<T, serde_json::Error> {
        self.snapshot().unmarshal(key)
    }

    /// Deserializes the value at `key`, or returns `fallback`.
    #[must_use]
    pub fn unmarshal_f<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        self.snapshot().unmarshal_f(key, fallback)
    }
}
