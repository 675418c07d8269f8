//! Environment variable layer.

use std::collections::HashMap;

use super::{Layer, LayerKind, SchemaPath, SchemaType};
use crate::value::Value;

/// Read access to environment variables.
///
/// The provider re-reads the source on every rebuild, so implementations
/// must reflect the current state rather than a copy taken at startup.
pub trait EnvSource: Send + Sync {
    /// Returns the value of `name`, or `None` if it is unset or not unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Maps a dotted key path to its environment variable name.
///
/// `log.level` with prefix `APP_` becomes `APP_LOG_LEVEL`.
#[must_use]
pub fn env_var_name(prefix: &str, path: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + path.len());
    name.push_str(prefix);
    name.extend(path.chars().map(|c| match c {
        '.' | '-' => '_',
        c => c.to_ascii_uppercase(),
    }));
    name
}

/// Builds the environment layer for the schema's key paths.
///
/// Only schema-declared paths are looked up. Values are coerced to the
/// declared type; a value that fails coercion is kept as a string so that
/// validation reports the mismatch.
#[must_use]
pub fn env_layer(paths: &[SchemaPath], prefix: &str, source: &dyn EnvSource) -> Layer {
    let mut layer = Layer::new("environment", LayerKind::Environment);
    for schema_path in paths {
        let name = env_var_name(prefix, &schema_path.path);
        if let Some(raw) = source.var(&name) {
            layer.set(&schema_path.path, coerce(&raw, schema_path.kind));
        }
    }
    layer
}

fn coerce(raw: &str, kind: SchemaType) -> Value {
    let trimmed = raw.trim();
    let coerced = match kind {
        SchemaType::String => None,
        SchemaType::Integer => trimmed.parse::<i64>().ok().map(Value::Int),
        SchemaType::Number => trimmed
            .parse::<i64>()
            .map(Value::Int)
            .ok()
            .or_else(|| trimmed.parse::<f64>().ok().map(Value::Float)),
        SchemaType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        SchemaType::Array => Some(coerce_array(trimmed)),
        SchemaType::Object => match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(obj @ serde_json::Value::Object(_)) => Some(Value::from(obj)),
            _ => None,
        },
        SchemaType::Any => match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(json @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                Some(Value::from(json))
            }
            _ => None,
        },
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn coerce_array(raw: &str) -> Value {
    if raw.starts_with('[') {
        if let Ok(list @ serde_json::Value::Array(_)) =
            serde_json::from_str::<serde_json::Value>(raw)
        {
            return Value::from(list);
        }
    }
    if raw.is_empty() {
        return Value::List(Vec::new());
    }
    Value::List(
        raw.split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect(),
    )
}
