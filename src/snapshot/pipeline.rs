//! Layer assembly.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::Snapshot;
use crate::error::LoadError;
use crate::layer::{
    EnvSource, FlagSet, Layer, SchemaPath, env_layer, file_layer, flags_layer,
};
use crate::value::merge_maps;

/// Rebuilds candidate snapshots from every source.
///
/// Schema defaults and key paths are computed once. Config files and the
/// environment are read again on every [`Pipeline::build`].
#[derive(Clone)]
pub struct Pipeline {
    defaults: Layer,
    schema_paths: Vec<SchemaPath>,
    files: Vec<PathBuf>,
    flags: FlagSet,
    env_prefix: String,
    env: Arc<dyn EnvSource>,
}

impl Pipeline {
    /// Creates a pipeline over the given sources.
    #[must_use]
    pub fn new(
        defaults: Layer,
        schema_paths: Vec<SchemaPath>,
        files: Vec<PathBuf>,
        flags: FlagSet,
        env_prefix: impl Into<String>,
        env: Arc<dyn EnvSource>,
    ) -> Self {
        Self {
            defaults,
            schema_paths,
            files,
            flags,
            env_prefix: env_prefix.into(),
            env,
        }
    }

    /// Returns the config files in precedence order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Returns the environment source.
    #[must_use]
    pub fn env(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    /// Reads every source and returns its layers in precedence order.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] raised by a config file.
    pub fn layers(&self) -> Result<Vec<Layer>, LoadError> {
        let mut layers = Vec::with_capacity(self.files.len() + 3);
        layers.push(self.defaults.clone());
        for path in &self.files {
            layers.push(file_layer(path)?);
        }

        let mut below_flags = crate::value::Map::new();
        for layer in &layers {
            merge_maps(&mut below_flags, layer.values().clone());
        }
        layers.push(flags_layer(&self.flags, &below_flags));
        layers.push(env_layer(
            &self.schema_paths,
            &self.env_prefix,
            self.env.as_ref(),
        ));
        Ok(layers)
    }

    /// Builds a candidate snapshot from the current state of every source.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] raised by a config file.
    pub fn build(&self) -> Result<Snapshot, LoadError> {
        self.layers().map(|layers| Snapshot::build(&layers))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("files", &self.files)
            .field("flags", &self.flags)
            .field("env_prefix", &self.env_prefix)
            .finish_non_exhaustive()
    }
}
