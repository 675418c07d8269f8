//! Configuration file parsing.
//!
//! The format is inferred from the file extension.

use std::path::{Path, PathBuf};

use super::{Layer, LayerKind};
use crate::error::LoadError;
use crate::value::{Map, Value};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.toml`
    Toml,
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl FileFormat {
    /// Infers the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownExtension`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(LoadError::UnknownExtension {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            }),
        }
    }

    /// Returns the format's display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    /// Parses document content into a nested map.
    ///
    /// Blank content is an empty map. `path` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] for malformed syntax or a non-map root.
    pub fn parse(self, content: &str, path: &Path) -> Result<Map, LoadError> {
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        let parse_error = |reason: String| LoadError::Parse {
            path: path.to_path_buf(),
            format: self.name(),
            reason,
        };

        let value = match self {
            Self::Toml => toml::from_str::<toml::Value>(content)
                .map(Value::from)
                .map_err(|e| parse_error(e.to_string()))?,
            Self::Json => serde_json::from_str::<serde_json::Value>(content)
                .map(Value::from)
                .map_err(|e| parse_error(e.to_string()))?,
            Self::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
                .map(Value::from)
                .map_err(|e| parse_error(e.to_string()))?,
        };

        match value {
            Value::Map(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(parse_error(format!(
                "expected a map at the document root, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Expands a leading `~/` to the user's home directory.
///
/// Paths without the prefix, or when no home directory is known, are
/// returned unchanged.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

/// Reads and parses a configuration file into a layer named after its path.
///
/// # Errors
///
/// Returns a [`LoadError`] if the extension is unknown, the file cannot be
/// read, or its content cannot be parsed.
pub fn file_layer(path: &Path) -> Result<Layer, LoadError> {
    let format = FileFormat::from_path(path)?;
    let resolved = expand_home(path);
    let content = std::fs::read_to_string(&resolved).map_err(|source| LoadError::FileRead {
        path: resolved.clone(),
        source,
    })?;

    let values = format.parse(&content, &resolved)?;
    Ok(Layer::from_map(
        resolved.display().to_string(),
        LayerKind::File,
        values,
    ))
}
