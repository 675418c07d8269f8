//! CLI argument parsing using clap.
//!
//! Defines the command-line interface of the `hotconf` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::defaults::DEBOUNCE_WINDOW_MS;
use crate::error::{ConfigError, LoadError};
use crate::layer::{FlagSet, expand_home};
use crate::provider::{Provider, ProviderBuilder};
use crate::reload::DebouncePolicy;

/// hotconf: layered, schema-validated configuration
///
/// Merges schema defaults, config files, overrides and environment
/// variables, validates the result, and reloads it when files change.
#[derive(Debug, Parser)]
#[command(name = "hotconf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for hotconf
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and validate the configuration, then print it as JSON
    Check(SourceArgs),

    /// Load the configuration and reload it whenever a config file changes
    Watch(WatchArgs),
}

/// Where the configuration comes from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Path to the JSON schema
    #[arg(long, short)]
    pub schema: PathBuf,

    /// Config file, lowest precedence first (repeatable or comma-separated)
    #[arg(long = "config", short = 'c', value_name = "FILE", value_delimiter = ',')]
    pub config: Vec<PathBuf>,

    /// Override in 'key.path=value' format (can be specified multiple times)
    #[arg(long = "set", value_name = "K=V")]
    pub overrides: Vec<String>,

    /// Prefix for environment variable names (e.g. APP_)
    #[arg(long = "env-prefix", default_value = "")]
    pub env_prefix: String,
}

/// Options for `watch`.
#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Configuration sources
    #[command(flatten)]
    pub source: SourceArgs,

    /// Key path that must not change on reload (can be specified multiple times)
    #[arg(long = "immutable", value_name = "KEY")]
    pub immutables: Vec<String>,

    /// Debounce window for file events, in milliseconds
    #[arg(long = "debounce-ms", default_value_t = DEBOUNCE_WINDOW_MS)]
    pub debounce_ms: u64,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }
}

impl SourceArgs {
    /// Converts `--set` overrides into changed flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for an argument without `=`
    /// or with an empty key.
    pub fn flag_set(&self) -> Result<FlagSet, ConfigError> {
        let mut flags = FlagSet::new();
        for raw in &self.overrides {
            let (key, value) = raw
                .split_once('=')
                .map(|(k, v)| (k.trim(), v))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| ConfigError::InvalidOverride { value: raw.clone() })?;
            flags.push(key, value, true);
        }
        Ok(flags)
    }

    /// Reads the schema file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::FileRead`] if the file cannot be read.
    pub fn read_schema(&self) -> Result<Vec<u8>, ConfigError> {
        let path = expand_home(&self.schema);
        std::fs::read(&path).map_err(|source| LoadError::FileRead { path, source }.into())
    }

    /// Creates a provider builder for these sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the schema cannot be read or an override
    /// is malformed.
    pub fn builder(&self) -> Result<ProviderBuilder, ConfigError> {
        Ok(Provider::builder(self.read_schema()?)
            .with_config_files(self.config.iter().cloned())
            .with_flags(self.flag_set()?)
            .with_env_prefix(self.env_prefix.clone()))
    }
}

impl WatchArgs {
    /// Returns the debounce policy selected by `--debounce-ms`.
    #[must_use]
    pub const fn debounce(&self) -> DebouncePolicy {
        DebouncePolicy::new(Duration::from_millis(self.debounce_ms))
    }

    /// Creates a provider builder for these sources and options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the schema cannot be read or an override
    /// is malformed.
    pub fn builder(&self) -> Result<ProviderBuilder, ConfigError> {
        Ok(self
            .source
            .builder()?
            .with_immutables(self.immutables.iter().cloned())
            .with_debounce(self.debounce()))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
