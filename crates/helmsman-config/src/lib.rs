#![deny(unsafe_code)]

//! Balancer configuration model for Helmsman.
//!
//! Provides the in-memory [`Document`] tree (sections → named instances →
//! keys → values, with preserved comments), keyword allow-lists derived
//! from section bitmasks, parsers for the balancer's indented text format
//! and its JSON variant, comment-preserving composers for both, and the
//! file-backed [`ConfigStore`] dispatching on file extension.

/// Composers rendering a document to text or JSON.
pub mod compose;
/// The configuration document tree and its mutation API.
pub mod document;
/// Keyword allow-lists derived from section bitmasks.
pub mod keywords;
/// Parsers for the text format and the JSON variant.
pub mod parse;
/// Configuration section types.
pub mod section;
/// File-backed store with format dispatch.
pub mod store;

pub use compose::{CommentStyle, compose_json, compose_text};
pub use document::{Document, DocumentError, GENERAL, KeySlot, PRE, Proxy, Value};
pub use parse::{parse_json, parse_text};
pub use section::Section;
pub use store::{ConfigStore, Format, ParseObserver};

/// Errors from parsing, composing, or moving configurations to disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no parser registered for extension {0:?}")]
    UnknownFormat(String),

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON document: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}
