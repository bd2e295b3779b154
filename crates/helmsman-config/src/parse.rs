//! Parsers for the balancer's text format and its JSON variant.
//!
//! The text format is line-oriented: a line opening with a section token
//! starts a new current section (second token = instance name), every other
//! line is matched against the current section's allow-list by keyword
//! prefix. Inline `# comments` are preserved into the document's commentary
//! maps, and a standalone `# text` line directly above a section header
//! becomes that instance's preamble. Lines that match no keyword, and lines
//! before the first section, are skipped.

use crate::ConfigError;
use crate::document::{Document, PRE, instance_name};
use crate::keywords;
use crate::section::Section;

/// Parse the balancer's indented text format into a [`Document`].
pub fn parse_text(source: &str) -> Result<Document, ConfigError> {
    let mut doc = Document::new();
    let mut current: Option<(Section, String)> = None;
    let mut pending_pre: Option<String> = None;

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        // A standalone comment line becomes the preamble of the next
        // section header, mirroring what the composer emits.
        if let Some(text) = line.strip_prefix('#') {
            pending_pre = Some(text.trim().to_string());
            continue;
        }

        if let Some(section) = Section::ALL.iter().copied().find(|s| line.starts_with(s.token())) {
            let name = instance_name(section, line.split_whitespace().nth(1)).to_string();
            if let Some(pre) = pending_pre.take() {
                doc.comment(section, &name, PRE, &pre)?;
            }
            current = Some((section, name));
            continue;
        }
        pending_pre = None;

        let Some((section, name)) = current.as_ref() else {
            continue;
        };
        let Some(key) = keywords::match_keyword(*section, line) else {
            continue;
        };

        // Strip the matched keyword; the remainder splits on `#` into the
        // value and an optional trailing comment.
        let rest = &line[key.len()..];
        let (value, comment) = match rest.split_once('#') {
            Some((value, comment)) => (value.trim(), Some(comment)),
            None => (rest.trim(), None),
        };

        let slot = doc.add(*section, name, key, value)?;
        match comment {
            Some(text) => slot.comment(text)?,
            None => drop(slot),
        }
    }

    Ok(doc)
}

/// Parse the JSON variant into a [`Document`].
///
/// The expected shape mirrors the JSON composer: section token → instance
/// name → entries, with `commentary` as a reserved sibling key inside each
/// instance object. Values pass through the same allow-list validation as
/// programmatic writes.
pub fn parse_json(source: &str) -> Result<Document, ConfigError> {
    let root: serde_json::Value = serde_json::from_str(source)?;
    let sections = root
        .as_object()
        .ok_or_else(|| ConfigError::InvalidJson("top level must be an object".to_string()))?;

    let mut doc = Document::new();
    for (token, instances) in sections {
        let section = Section::from_token(token)
            .ok_or_else(|| ConfigError::InvalidJson(format!("unknown section {token:?}")))?;
        let instances = instances.as_object().ok_or_else(|| {
            ConfigError::InvalidJson(format!("section {token:?} must hold an object"))
        })?;

        for (name, body) in instances {
            let body = body.as_object().ok_or_else(|| {
                ConfigError::InvalidJson(format!("instance {token} {name} must hold an object"))
            })?;

            // Entries first; commentary may only reference written keys.
            for (key, value) in body {
                if key == "commentary" {
                    continue;
                }
                match value {
                    serde_json::Value::String(v) => {
                        let _ = doc.set(section, name, key, v.as_str())?;
                    }
                    serde_json::Value::Array(items) => {
                        for item in items {
                            let v = item.as_str().ok_or_else(|| {
                                ConfigError::InvalidJson(format!(
                                    "values of {key:?} must be strings"
                                ))
                            })?;
                            let _ = doc.add(section, name, key, v)?;
                        }
                    }
                    _ => {
                        return Err(ConfigError::InvalidJson(format!(
                            "value of {key:?} must be a string or array of strings"
                        )));
                    }
                }
            }

            if let Some(commentary) = body.get("commentary") {
                let commentary = commentary.as_object().ok_or_else(|| {
                    ConfigError::InvalidJson("commentary must hold an object".to_string())
                })?;
                for (key, text) in commentary {
                    let text = text.as_str().ok_or_else(|| {
                        ConfigError::InvalidJson("comments must be strings".to_string())
                    })?;
                    doc.comment(section, name, key, text)?;
                }
            }
        }
    }

    Ok(doc)
}
