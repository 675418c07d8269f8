//! Default values for provider options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Name of the flag that lists configuration files.
///
/// This flag is never mapped to a configuration key.
pub const CONFIG_FLAG: &str = "config";

/// Default debounce window for file-change events, in milliseconds.
pub const DEBOUNCE_WINDOW_MS: u64 = 100;

/// Default capacity of the reload notification broadcast channel.
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Maximum nesting and `$ref` indirection followed while walking a schema.
pub const REF_DEPTH_LIMIT: usize = 32;

/// Default sampler type for derived tracing configuration.
pub const TRACING_SAMPLER_TYPE: &str = "const";

/// Default sampler value for derived tracing configuration.
pub const TRACING_SAMPLER_VALUE: f64 = 1.0;

/// Environment variable that overrides the configured Jaeger propagation.
pub const JAEGER_PROPAGATION_ENV: &str = "JAEGER_PROPAGATION";

/// Default debounce window as Duration.
#[must_use]
pub const fn debounce_window() -> Duration {
    Duration::from_millis(DEBOUNCE_WINDOW_MS)
}
