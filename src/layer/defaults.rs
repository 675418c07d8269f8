//! Schema-derived defaults and key paths.

use serde_json::Value as Json;

use super::{Layer, LayerKind};
use crate::defaults::REF_DEPTH_LIMIT;
use crate::value::{Map, Value, insert_path};

/// JSON type declared for a schema key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    /// `"type": "string"`
    String,
    /// `"type": "integer"`
    Integer,
    /// `"type": "number"`
    Number,
    /// `"type": "boolean"`
    Boolean,
    /// `"type": "array"`
    Array,
    /// `"type": "object"` without declared properties
    Object,
    /// No usable type declared
    Any,
}

impl SchemaType {
    fn of(node: &Json) -> Self {
        let declared = match node.get("type") {
            Some(Json::String(t)) => Some(t.as_str()),
            // ["string", "null"] style unions: first non-null wins
            Some(Json::Array(types)) => types
                .iter()
                .filter_map(Json::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };
        match declared {
            Some("string") => Self::String,
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ if node.get("properties").is_some() => Self::Object,
            _ => Self::Any,
        }
    }
}

/// A leaf key path declared by the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPath {
    /// Dotted key path.
    pub path: String,
    /// Declared type.
    pub kind: SchemaType,
}

/// Builds the defaults layer from a JSON schema.
///
/// Every `default` keyword found on a property is placed at that property's
/// dotted path. An object-level default is applied first and nested defaults
/// below it are merged on top.
#[must_use]
pub fn defaults_layer(schema: &Json) -> Layer {
    let mut values = Map::new();
    walk(schema, schema, "", 0, &mut |path: &str, node: &Json| {
        if let Some(default) = node.get("default") {
            if !path.is_empty() {
                insert_path(&mut values, path, Value::from(default.clone()));
            }
        }
    });
    Layer::from_map("defaults", LayerKind::Defaults, values)
}

/// Lists every leaf key path declared by the schema with its type.
///
/// Objects with declared `properties` are descended into; everything else is
/// a leaf. Paths are returned in traversal order (properties sorted by
/// name), without duplicates.
#[must_use]
pub fn schema_paths(schema: &Json) -> Vec<SchemaPath> {
    let mut paths: Vec<SchemaPath> = Vec::new();
    walk(schema, schema, "", 0, &mut |path: &str, node: &Json| {
        if path.is_empty() || has_properties(node) {
            return;
        }
        if paths.iter().any(|p| p.path == path) {
            return;
        }
        paths.push(SchemaPath {
            path: path.to_string(),
            kind: SchemaType::of(node),
        });
    });
    paths
}

fn has_properties(node: &Json) -> bool {
    node.get("properties").is_some_and(Json::is_object)
}

/// Visits `node` and every property below it, resolving local `$ref`s.
///
/// `depth` bounds recursion so self-referencing schemas terminate.
fn walk(root: &Json, node: &Json, path: &str, depth: usize, visit: &mut dyn FnMut(&str, &Json)) {
    if depth > REF_DEPTH_LIMIT {
        return;
    }
    let node = resolve_ref(root, node);
    visit(path, node);

    if let Some(Json::Object(properties)) = node.get("properties") {
        for (name, child) in properties {
            let child_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{path}.{name}")
            };
            walk(root, child, &child_path, depth + 1, visit);
        }
    }

    if let Some(Json::Array(branches)) = node.get("allOf") {
        for branch in branches {
            walk_branch(root, branch, path, depth + 1, visit);
        }
    }
}

/// Walks an `allOf` branch without visiting its root a second time.
fn walk_branch(
    root: &Json,
    branch: &Json,
    path: &str,
    depth: usize,
    visit: &mut dyn FnMut(&str, &Json),
) {
    let mut nested = |p: &str, n: &Json| {
        if p != path {
            visit(p, n);
        }
    };
    walk(root, branch, path, depth, &mut nested);
}

/// Follows local `$ref` pointers (`#/definitions/...`, `#/$defs/...`).
///
/// Remote references and dangling pointers resolve to the node itself.
fn resolve_ref<'a>(root: &'a Json, node: &'a Json) -> &'a Json {
    let mut current = node;
    for _ in 0..REF_DEPTH_LIMIT {
        let Some(reference) = current.get("$ref").and_then(Json::as_str) else {
            return current;
        };
        let Some(pointer) = reference.strip_prefix('#') else {
            return current;
        };
        match root.pointer(pointer) {
            Some(target) if !std::ptr::eq(target, current) => current = target,
            _ => return current,
        }
    }
    current
}
