//! Typed reads from one snapshot.
//!
//! Every getter has an `_f` variant taking a fallback. The fallback is
//! returned when the key is absent or its value cannot be converted; the
//! plain getters use the type's zero value instead.

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::Snapshot;
use crate::value::Value;

impl Snapshot {
    /// Returns the value at `key`, or `fallback`.
    #[must_use]
    pub fn get_f(&self, key: &str, fallback: impl Into<Value>) -> Value {
        self.get(key).cloned().unwrap_or_else(|| fallback.into())
    }

    /// Returns `key` as a string; non-string scalars are formatted.
    #[must_use]
    pub fn string(&self, key: &str) -> String {
        self.string_f(key, "")
    }

    /// Returns `key` as a string, or `fallback`.
    #[must_use]
    pub fn string_f(&self, key: &str, fallback: &str) -> String {
        self.get(key)
            .map_or_else(|| fallback.to_string(), ToString::to_string)
    }

    /// Returns `key` as a boolean.
    #[must_use]
    pub fn bool(&self, key: &str) -> bool {
        self.bool_f(key, false)
    }

    /// Returns `key` as a boolean, or `fallback`.
    #[must_use]
    pub fn bool_f(&self, key: &str, fallback: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(fallback)
    }

    /// Returns `key` as an integer.
    #[must_use]
    pub fn int(&self, key: &str) -> i64 {
        self.int_f(key, 0)
    }

    /// Returns `key` as an integer, or `fallback`.
    #[must_use]
    pub fn int_f(&self, key: &str, fallback: i64) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or(fallback)
    }

    /// Returns `key` as a float.
    #[must_use]
    pub fn float64(&self, key: &str) -> f64 {
        self.float64_f(key, 0.0)
    }

    /// Returns `key` as a float, or `fallback`.
    #[must_use]
    pub fn float64_f(&self, key: &str, fallback: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(fallback)
    }

    /// Returns `key` as a duration; numbers are seconds.
    #[must_use]
    pub fn duration(&self, key: &str) -> Duration {
        self.duration_f(key, Duration::ZERO)
    }

    /// Returns `key` as a duration, or `fallback`.
    #[must_use]
    pub fn duration_f(&self, key: &str, fallback: Duration) -> Duration {
        self.get(key)
            .and_then(Value::as_duration)
            .unwrap_or(fallback)
    }

    /// Returns `key` as a list of strings.
    #[must_use]
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.strings_f(key, Vec::new())
    }

    /// Returns `key` as a list of strings, or `fallback`.
    #[must_use]
    pub fn strings_f(&self, key: &str, fallback: Vec<String>) -> Vec<String> {
        self.get(key).and_then(Value::as_strings).unwrap_or(fallback)
    }

    /// Deserializes the value at `key`; an empty key deserializes the whole
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the value does not match `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self, key: &str) -> Result<T, serde_json::Error> {
        let json = if key.is_empty() {
            self.to_json()
        } else {
            self.get(key).map_or(serde_json::Value::Null, Value::to_json)
        };
        serde_json::from_value(json)
    }

    /// Deserializes the value at `key`, or returns `fallback`.
    #[must_use]
    pub fn unmarshal_f<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        if !key.is_empty() && !self.exists(key) {
            return fallback;
        }
        self.unmarshal(key).unwrap_or(fallback)
    }
}
