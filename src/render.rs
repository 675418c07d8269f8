//! Human-readable rendering of validation errors.

use std::io::{self, Write};

use serde_json::Value as Json;

use crate::error::ValidationError;

/// Writes a multi-line report of `error` to `w`.
///
/// `config_json` is the marshaled configuration the error was produced for.
/// Each issue cites its key path, the offending value taken from that
/// document, and the reason, with a caret under the value:
///
/// ```text
/// The configuration contains values or keys which are invalid:
/// log.level: "loud"
///            ^-- "loud" is not one of ["info","debug"]
///
/// Found 1 validation error(s).
/// ```
///
/// # Errors
///
/// Returns any I/O error raised by `w`.
pub fn render_validation_errors(
    w: &mut impl Write,
    config_json: &[u8],
    error: &ValidationError,
) -> io::Result<()> {
    let document: Option<Json> = serde_json::from_slice(config_json).ok();

    writeln!(w, "The configuration contains values or keys which are invalid:")?;
    for issue in &error.issues {
        let path = issue.display_path();
        let value = match &document {
            None => "<unavailable>".to_string(),
            Some(doc) => lookup(doc, &issue.path)
                .map_or_else(|| "<missing>".to_string(), Json::to_string),
        };
        writeln!(w, "{path}: {value}")?;
        writeln!(w, "{:indent$}^-- {}", "", issue.message, indent = path.chars().count() + 2)?;
        writeln!(w)?;
    }
    writeln!(w, "Found {} validation error(s).", error.issues.len())
}

fn lookup<'a>(doc: &'a Json, path: &str) -> Option<&'a Json> {
    if path.is_empty() {
        return Some(doc);
    }
    path.split('.').try_fold(doc, |node, segment| match node {
        Json::Object(map) => map.get(segment),
        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
