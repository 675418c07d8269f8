//! Schema validation of candidate snapshots.

use std::fmt;

use serde_json::Value as Json;

use crate::error::{ConfigError, ValidationError, ValidationIssue};
use crate::layer::{Layer, SchemaPath, defaults_layer, schema_paths};
use crate::snapshot::Snapshot;

/// A compiled JSON schema.
///
/// Stateless across calls: validating never changes the validator.
pub struct Validator {
    schema: Json,
    compiled: jsonschema::Validator,
}

impl Validator {
    /// Compiles raw JSON schema bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Schema`] if the bytes are not JSON or not a
    /// valid schema.
    pub fn compile(schema: &[u8]) -> Result<Self, ConfigError> {
        let schema: Json = serde_json::from_slice(schema).map_err(|e| ConfigError::Schema {
            reason: e.to_string(),
        })?;
        Self::from_json(schema)
    }

    /// Compiles an already parsed schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Schema`] if the schema does not compile.
    pub fn from_json(schema: Json) -> Result<Self, ConfigError> {
        let compiled = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Schema {
            reason: e.to_string(),
        })?;
        Ok(Self { schema, compiled })
    }

    /// Returns the parsed schema document.
    #[must_use]
    pub const fn schema(&self) -> &Json {
        &self.schema
    }

    /// Returns the defaults layer declared by the schema.
    #[must_use]
    pub fn defaults(&self) -> Layer {
        defaults_layer(&self.schema)
    }

    /// Returns every leaf key path declared by the schema.
    #[must_use]
    pub fn paths(&self) -> Vec<SchemaPath> {
        schema_paths(&self.schema)
    }

    /// Checks a snapshot against the schema.
    ///
    /// # Errors
    ///
    /// Returns every violation found, ordered by key path.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<(), ValidationError> {
        self.validate_json(&snapshot.to_json())
    }

    /// Checks a JSON document against the schema.
    ///
    /// # Errors
    ///
    /// Returns every violation found, ordered by key path.
    pub fn validate_json(&self, instance: &Json) -> Result<(), ValidationError> {
        let mut issues: Vec<ValidationIssue> = self
            .compiled
            .iter_errors(instance)
            .map(|err| {
                ValidationIssue::new(pointer_to_path(&err.instance_path.to_string()), err.to_string())
            })
            .collect();

        if issues.is_empty() {
            return Ok(());
        }
        issues.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
        issues.dedup();
        Err(ValidationError::new(issues))
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Converts a JSON pointer (`/log/level`) to a dotted path (`log.level`).
fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
