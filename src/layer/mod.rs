//! Layer sources.
//!
//! Each source produces one [`Layer`]: a named mapping from dotted key paths
//! to values. Layers are pure functions of their input:
//! - [`defaults_layer`]: `default` keywords of the JSON schema
//! - [`file_layer`]: a TOML, JSON or YAML config file
//! - [`flags_layer`]: command-line flags ([`FlagSet`])
//! - [`env_layer`]: environment variables mapped to schema key paths
//!
//! # Precedence
//!
//! From lowest to highest: schema defaults, config files in the order
//! supplied, flags, environment. The snapshot builder merges layers in that
//! order; see [`crate::snapshot`].

mod defaults;
mod env;
mod file;
mod flags;


pub use defaults::{SchemaPath, SchemaType, defaults_layer, schema_paths};
pub use env::{EnvSource, ProcessEnv, env_layer, env_var_name};
pub use file::{FileFormat, expand_home, file_layer};
pub use flags::{Flag, FlagSet, flags_layer, parse_flag_value};

use std::fmt;

use crate::value::{Map, Value, insert_path, leaf_paths};

/// Which kind of source produced a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Defaults declared in the schema.
    Defaults,
    /// A configuration file.
    File,
    /// Command-line flags.
    Flags,
    /// Environment variables.
    Environment,
    /// A programmatic override set at runtime.
    Override,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::File => "file",
            Self::Flags => "flags",
            Self::Environment => "environment",
            Self::Override => "override",
        })
    }
}

/// One prioritized source of configuration values.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    kind: LayerKind,
    values: Map,
}

impl Layer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self::from_map(name, kind, Map::new())
    }

    /// Creates a layer from an already nested map.
    #[must_use]
    pub fn from_map(name: impl Into<String>, kind: LayerKind, values: Map) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Sets a value at a dotted key path.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        insert_path(&mut self.values, path, value.into());
    }

    /// Builder-style [`Layer::set`].
    #[must_use]
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value);
        self
    }

    /// Looks up a value by dotted key path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (first, rest) = path.split_once('.').unwrap_or((path, ""));
        let top = self.values.get(first)?;
        top.lookup(rest)
    }

    /// Returns the layer's name (file path, `defaults`, `flags`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of source that produced this layer.
    #[must_use]
    pub const fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Returns the nested values.
    #[must_use]
    pub const fn values(&self) -> &Map {
        &self.values
    }

    /// Returns the dotted paths of every leaf value, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        leaf_paths(&self.values, "", &mut keys);
        keys
    }

    /// Returns true if the layer sets no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
