//! Error taxonomy for loading, validating and reloading configuration.
//!
//! Startup paths return [`ConfigError`]. Reload paths never return errors to
//! the caller; they wrap the cause in a [`ReloadError`] and hand it to the
//! notification channel.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::value::Value;

/// A configuration source could not be read or parsed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not map to a supported format.
    #[error("Unknown config file extension '{extension}' for '{}': expected .toml, .json, .yaml or .yml", path.display())]
    UnknownExtension {
        /// Path to the config file
        path: PathBuf,
        /// The extension found (empty if none)
        extension: String,
    },

    /// The file content is not valid for its format.
    #[error("Failed to parse {format} config file '{}': {reason}", path.display())]
    Parse {
        /// Path to the config file
        path: PathBuf,
        /// Format name (TOML, JSON, YAML)
        format: &'static str,
        /// Parser diagnostic
        reason: String,
    },
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted key path of the offending value; empty for the document root.
    pub path: String,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the path for display, using `(root)` for the document root.
    #[must_use]
    pub fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_path(), self.message)
    }
}

/// The merged configuration does not satisfy the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// All violations, ordered by key path.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Creates a validation error from a list of issues.
    #[must_use]
    pub const fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Returns true if any issue points at `path`.
    #[must_use]
    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "configuration failed schema validation ({} issue(s))",
            self.issues.len()
        )?;
        for (i, issue) in self.issues.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A key declared immutable differs between the live snapshot and a candidate.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "immutable configuration key \"{key}\" was changed from {} to {}",
    describe(.old.as_ref()),
    describe(.new.as_ref())
)]
pub struct ImmutableViolation {
    /// The protected key path.
    pub key: String,
    /// Value in the live snapshot.
    pub old: Option<Value>,
    /// Value in the rejected candidate.
    pub new: Option<Value>,
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unset>".to_string(), |v| format!("{v:?}"))
}

/// The file watcher failed.
///
/// Carried inside [`crate::reload::ReloadEvent::WatchError`], so it is `Clone`
/// and keeps the backend's diagnostic as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// Watching could not be set up for a path.
    #[error("Failed to watch '{}': {reason}", path.display())]
    Setup {
        /// The path that could not be watched
        path: PathBuf,
        /// Reason reported by the backend
        reason: String,
    },

    /// The watch backend reported an error while running.
    #[error("Watch backend error: {0}")]
    Backend(String),
}

/// Startup failure. The caller must refuse to serve.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The schema is not valid JSON or could not be compiled.
    #[error("Invalid configuration schema: {reason}")]
    Schema {
        /// Compiler diagnostic
        reason: String,
    },

    /// A configuration source failed to load.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The initial snapshot failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A config file could not be watched.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// A command-line override is not in `KEY=VALUE` form.
    #[error("Invalid override '{value}': expected KEY=VALUE")]
    InvalidOverride {
        /// The rejected argument
        value: String,
    },
}

/// Why a reload attempt did not commit.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Rebuilding the candidate failed while reading sources.
    #[error("Failed to load changed configuration: {0}")]
    Load(#[source] LoadError),

    /// The candidate failed schema validation.
    #[error("Changed configuration is invalid: {0}")]
    Validation(#[source] ValidationError),

    /// The candidate changed an immutable key.
    #[error("Changed configuration was rejected: {0}")]
    Immutable(#[source] ImmutableViolation),

    /// The watcher reported an error.
    #[error("Configuration watch failed: {0}")]
    Watch(#[source] WatchError),
}

impl ReloadError {
    /// Returns the validation error, if this is one.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the immutable-key violation, if this is one.
    #[must_use]
    pub const fn as_immutable(&self) -> Option<&ImmutableViolation> {
        match self {
            Self::Immutable(err) => Some(err),
            _ => None,
        }
    }
}
