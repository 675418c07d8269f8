//! Command-line flag layer.

use super::{Layer, LayerKind};
use crate::defaults::CONFIG_FLAG;
use crate::value::{Map, Value};

/// A single named flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    /// Dot-joined key path the flag maps to, e.g. `log.level`.
    pub name: String,
    /// Raw textual value.
    pub value: String,
    /// True if the flag was passed explicitly; false for a declared default.
    pub changed: bool,
}

/// An ordered set of flags.
///
/// Later flags with the same name replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<Flag>,
}

impl FlagSet {
    /// Creates an empty flag set.
    #[must_use]
    pub const fn new() -> Self {
        Self { flags: Vec::new() }
    }

    /// Adds a flag, replacing any earlier flag with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>, changed: bool) {
        let name = name.into();
        self.flags.retain(|f| f.name != name);
        self.flags.push(Flag {
            name,
            value: value.into(),
            changed,
        });
    }

    /// Adds an explicitly passed flag.
    #[must_use]
    pub fn with_changed(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value, true);
        self
    }

    /// Adds a declared default that was not passed.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value, false);
        self
    }

    /// Looks up a flag by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Returns the config file paths listed by the reserved `config` flag.
    ///
    /// The value is a comma-separated list; blank entries are skipped.
    #[must_use]
    pub fn config_files(&self) -> Vec<String> {
        self.get(CONFIG_FLAG)
            .map(|flag| {
                flag.value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterates flags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns true if the set contains no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Builds the flag layer.
///
/// `base` is the merge of every layer below flags. Changed flags always set
/// their key; unchanged flags only fill keys missing from `base`. The
/// reserved `config` flag never becomes a key.
#[must_use]
pub fn flags_layer(flags: &FlagSet, base: &Map) -> Layer {
    let mut layer = Layer::new("flags", LayerKind::Flags);
    for flag in flags.iter() {
        if flag.name == CONFIG_FLAG || flag.name.is_empty() {
            continue;
        }
        if !flag.changed && present(base, &flag.name) {
            continue;
        }
        layer.set(&flag.name, parse_flag_value(&flag.value));
    }
    layer
}

fn present(base: &Map, path: &str) -> bool {
    let (first, rest) = path.split_once('.').unwrap_or((path, ""));
    base.get(first)
        .and_then(|v| v.lookup(rest))
        .is_some_and(|v| !v.is_null())
}

/// Types a raw flag value.
///
/// `true`/`false` become booleans, integers and decimals become numbers, a
/// `[...]` JSON array becomes a list; anything else stays a string.
#[must_use]
pub fn parse_flag_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_numeric(trimmed) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
    }
    if trimmed.starts_with('[') {
        if let Ok(list @ serde_json::Value::Array(_)) =
            serde_json::from_str::<serde_json::Value>(trimmed)
        {
            return Value::from(list);
        }
    }
    Value::String(raw.to_string())
}

/// Rejects `inf`, `NaN` and friends, which `f64::from_str` accepts.
fn looks_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && s.chars().any(|c| c.is_ascii_digit())
}
