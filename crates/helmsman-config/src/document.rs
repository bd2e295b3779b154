//! In-memory configuration document tree.
//!
//! The tree is `section → instance → key → value`, with a per-instance
//! commentary map riding alongside the entries. Insertion order is
//! preserved everywhere (the text composer renders keys in the order they
//! were written), so the maps are [`IndexMap`]s rather than hash or btree
//! maps.
//!
//! The document is not internally synchronized. Callers that mutate it
//! from several tasks must wrap it in their own exclusive handle.

use indexmap::IndexMap;

use crate::keywords;
use crate::section::Section;

/// Synthetic instance name for unnamed sections.
pub const GENERAL: &str = "general";

/// Commentary key for an instance-level preamble comment.
pub const PRE: &str = "pre";

/// Errors from document mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("keyword {key:?} is not allowed in section '{section}'")]
    DisallowedKey { section: Section, key: String },

    #[error("cannot comment unwritten key {key:?} in '{section} {name}'")]
    CommentWithoutKey {
        section: Section,
        name: String,
        key: String,
    },
}

/// A configuration value: a scalar, or an ordered sequence for directives
/// that repeat (`server`, `acl`, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    One(String),
    Many(Vec<String>),
}

impl Value {
    /// The scalar value, if this has not been promoted to a sequence.
    pub fn as_one(&self) -> Option<&str> {
        match self {
            Value::One(v) => Some(v),
            Value::Many(_) => None,
        }
    }

    /// All values in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Value::One(v) => std::slice::from_ref(v),
            Value::Many(items) => items.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

/// One named occurrence of a section: its entries and their comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxy {
    entries: IndexMap<String, Value>,
    commentary: IndexMap<String, String>,
}

impl Proxy {
    /// Entries in insertion order.
    pub fn entries(&self) -> &IndexMap<String, Value> {
        &self.entries
    }

    /// Commentary map (includes the [`PRE`] preamble when set).
    pub fn commentary(&self) -> &IndexMap<String, String> {
        &self.commentary
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Comment stored for `key`.
    pub fn comment_for(&self, key: &str) -> Option<&str> {
        self.commentary.get(key).map(String::as_str)
    }
}

/// The configuration document: sections, their instances, and values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    sections: IndexMap<Section, IndexMap<String, Proxy>>,
}

/// Handle to a key that was just written; attaches a comment to exactly
/// that key.
#[must_use = "dropping the slot discards the chance to comment the key"]
#[derive(Debug)]
pub struct KeySlot<'a> {
    doc: &'a mut Document,
    section: Section,
    name: String,
    key: String,
}

impl KeySlot<'_> {
    /// Attach a comment to the key this slot was returned for.
    pub fn comment(self, text: &str) -> Result<(), DocumentError> {
        self.doc.comment(self.section, &self.name, &self.key, text)
    }
}

/// Resolve the instance name for a section: explicit names pass through for
/// named sections; everything else folds into [`GENERAL`].
pub fn instance_name(section: Section, name: Option<&str>) -> &str {
    match name {
        Some(n) if section.named() && !n.is_empty() => n,
        _ => GENERAL,
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &IndexMap<String, Proxy>)> {
        self.sections.iter().map(|(s, i)| (*s, i))
    }

    /// All instances of a section.
    pub fn section(&self, section: Section) -> Option<&IndexMap<String, Proxy>> {
        self.sections.get(&section)
    }

    /// A single instance.
    pub fn proxy(&self, section: Section, name: &str) -> Option<&Proxy> {
        self.sections.get(&section)?.get(name)
    }

    /// The value of a key within an instance.
    pub fn value(&self, section: Section, name: &str, key: &str) -> Option<&Value> {
        self.proxy(section, name)?.get(key)
    }

    /// Drop all sections.
    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Write a scalar value, replacing any previous value for the key.
    ///
    /// The key must be in the section's allow-list. Intermediate maps are
    /// created lazily. The returned [`KeySlot`] attaches a comment to
    /// exactly this key.
    pub fn set(
        &mut self,
        section: Section,
        name: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Result<KeySlot<'_>, DocumentError> {
        self.check_allowed(section, key)?;
        self.proxy_mut(section, name)
            .entries
            .insert(key.to_string(), Value::One(value.into()));
        Ok(self.slot(section, name, key))
    }

    /// Append a value to a key. An unset key behaves like [`Document::set`];
    /// a scalar is promoted to a two-element sequence; a sequence grows.
    pub fn add(
        &mut self,
        section: Section,
        name: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Result<KeySlot<'_>, DocumentError> {
        self.check_allowed(section, key)?;
        let value = value.into();
        let proxy = self.proxy_mut(section, name);
        match proxy.entries.get_mut(key) {
            None => {
                proxy.entries.insert(key.to_string(), Value::One(value));
            }
            Some(slot) => match slot {
                Value::One(prev) => *slot = Value::Many(vec![std::mem::take(prev), value]),
                Value::Many(items) => items.push(value),
            },
        }
        Ok(self.slot(section, name, key))
    }

    /// Store a trimmed comment for a key, or for the whole instance when
    /// `key` is [`PRE`]. Empty text is a no-op. A non-`pre` comment may only
    /// be attached to a key that has already been written.
    pub fn comment(
        &mut self,
        section: Section,
        name: &str,
        key: &str,
        text: &str,
    ) -> Result<(), DocumentError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if key != PRE && self.value(section, name, key).is_none() {
            return Err(DocumentError::CommentWithoutKey {
                section,
                name: name.to_string(),
                key: key.to_string(),
            });
        }
        self.proxy_mut(section, name)
            .commentary
            .insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn check_allowed(&self, section: Section, key: &str) -> Result<(), DocumentError> {
        if keywords::is_allowed(section, key) {
            Ok(())
        } else {
            Err(DocumentError::DisallowedKey {
                section,
                key: key.to_string(),
            })
        }
    }

    fn proxy_mut(&mut self, section: Section, name: &str) -> &mut Proxy {
        self.sections
            .entry(section)
            .or_default()
            .entry(name.to_string())
            .or_default()
    }

    fn slot(&mut self, section: Section, name: &str, key: &str) -> KeySlot<'_> {
        KeySlot {
            doc: self,
            section,
            name: name.to_string(),
            key: key.to_string(),
        }
    }
}
