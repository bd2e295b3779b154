//! Composers rendering a [`Document`] back to text or JSON.

use std::fmt::Write as _;

use crate::ConfigError;
use crate::document::{Document, GENERAL, PRE, Value};

/// Whether the JSON composer keeps or strips commentary.
///
/// The text format always preserves comments; for JSON both behaviors are
/// legitimate, so the choice is the caller's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentStyle {
    /// Include `commentary` objects (lossless round-trip).
    #[default]
    Keep,
    /// Drop all commentary from the output.
    Strip,
}

/// Render the document in the balancer's indented text format.
///
/// Keys are emitted in insertion order, one `    key value` line each.
/// Sequence values emit one line per element; their trailing comment is
/// attached to the second element only, matching the source convention.
/// Instance preambles render as a `# text` line above the header, and the
/// synthetic [`GENERAL`] instance renders a bare section header.
pub fn compose_text(doc: &Document) -> String {
    let mut out = String::new();

    for (section, instances) in doc.iter() {
        for (name, proxy) in instances {
            if let Some(pre) = proxy.comment_for(PRE) {
                let _ = writeln!(out, "# {pre}");
            }
            if name == GENERAL {
                let _ = writeln!(out, "{section}");
            } else {
                let _ = writeln!(out, "{section} {name}");
            }

            for (key, value) in proxy.entries() {
                let comment = proxy.comment_for(key);
                match value {
                    Value::One(v) => {
                        push_line(&mut out, key, v, comment);
                    }
                    Value::Many(items) => {
                        for (index, v) in items.iter().enumerate() {
                            push_line(&mut out, key, v, comment.filter(|_| index == 1));
                        }
                    }
                }
            }
            out.push('\n');
        }
    }

    out
}

fn push_line(out: &mut String, key: &str, value: &str, comment: Option<&str>) {
    out.push_str("    ");
    out.push_str(key);
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    if let Some(comment) = comment {
        let _ = write!(out, " # {comment}");
    }
    out.push('\n');
}

/// Render the document as stable 2-space-indented JSON.
pub fn compose_json(doc: &Document, comments: CommentStyle) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(&to_json_value(doc, comments))?)
}

/// Build the JSON value tree for the document.
pub fn to_json_value(doc: &Document, comments: CommentStyle) -> serde_json::Value {
    let mut sections = serde_json::Map::new();

    for (section, instances) in doc.iter() {
        let mut named = serde_json::Map::new();
        for (name, proxy) in instances {
            let mut body = serde_json::Map::new();
            for (key, value) in proxy.entries() {
                let rendered = match value {
                    Value::One(v) => serde_json::Value::String(v.clone()),
                    Value::Many(items) => serde_json::Value::Array(
                        items
                            .iter()
                            .map(|v| serde_json::Value::String(v.clone()))
                            .collect(),
                    ),
                };
                body.insert(key.clone(), rendered);
            }
            if comments == CommentStyle::Keep && !proxy.commentary().is_empty() {
                let commentary: serde_json::Map<_, _> = proxy
                    .commentary()
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                body.insert(
                    "commentary".to_string(),
                    serde_json::Value::Object(commentary),
                );
            }
            named.insert(name.clone(), serde_json::Value::Object(body));
        }
        sections.insert(section.token().to_string(), serde_json::Value::Object(named));
    }

    serde_json::Value::Object(sections)
}
