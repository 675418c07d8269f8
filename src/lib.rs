//! hotconf: layered, schema-validated configuration with hot reload
//!
//! Merges schema defaults, config files, command-line flags and
//! environment variables into one immutable snapshot, validates it against
//! a JSON schema, and swaps in a new snapshot whenever a watched file
//! changes. Rejected reloads keep the previous snapshot.

pub mod cli;
pub mod defaults;
pub mod error;
pub mod guard;
pub mod layer;
pub mod provider;
pub mod reload;
pub mod render;
pub mod schema;
pub mod snapshot;
pub mod time;
pub mod value;

pub use error::{
    ConfigError, ImmutableViolation, LoadError, ReloadError, ValidationError, ValidationIssue,
    WatchError,
};
pub use layer::{EnvSource, FlagSet, Layer, LayerKind, ProcessEnv};
pub use provider::{CorsPolicy, Provider, ProviderBuilder, TracingConfig};
pub use reload::{
    ConfigWatcher, DebouncePolicy, NotifyWatcher, ReloadEvent, ReloadNotification,
};
pub use snapshot::Snapshot;
pub use value::Value;
