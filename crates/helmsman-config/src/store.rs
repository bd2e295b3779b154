//! File-backed configuration store with format dispatch.
//!
//! The store owns a [`Document`] and moves it to and from disk. The format
//! is selected by file extension: reading a path with no registered parser
//! is a hard failure, while writing an unrecognized extension falls back to
//! the text format (the only one the balancer itself accepts).

use std::path::Path;

use tracing::debug;

use crate::ConfigError;
use crate::compose::{CommentStyle, compose_json, compose_text};
use crate::document::Document;
use crate::parse::{parse_json, parse_text};

/// A configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The balancer's indented keyword format (`.cfg`).
    Text,
    /// The JSON variant (`.json`).
    Json,
}

impl Format {
    /// Look up the format registered for a file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext {
            "cfg" => Some(Format::Text),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    fn extension_of(path: &Path) -> String {
        path.extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Format for reading `path`; unregistered extensions are an error.
    pub fn for_reading(path: &Path) -> Result<Format, ConfigError> {
        let ext = Self::extension_of(path);
        Format::from_extension(&ext).ok_or(ConfigError::UnknownFormat(ext))
    }

    /// Format for writing `path`; unregistered extensions fall back to text.
    pub fn for_writing(path: &Path) -> Format {
        Format::from_extension(&Self::extension_of(path)).unwrap_or(Format::Text)
    }
}

/// Observer notified after a source has been parsed into the store.
pub trait ParseObserver: Send {
    /// A document was parsed from the given format.
    fn parsed(&mut self, format: Format);
}

/// Owns a [`Document`] and its movement to and from disk.
///
/// Single-writer: the store is not internally synchronized.
pub struct ConfigStore {
    document: Document,
    comments: CommentStyle,
    observer: Option<Box<dyn ParseObserver>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            comments: CommentStyle::default(),
            observer: None,
        }
    }

    /// Choose how the JSON composer treats commentary.
    pub fn with_comment_style(mut self, comments: CommentStyle) -> Self {
        self.comments = comments;
        self
    }

    /// Register the observer notified after each successful parse.
    pub fn set_observer(&mut self, observer: Box<dyn ParseObserver>) {
        self.observer = Some(observer);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Drop the current document.
    pub fn reset(&mut self) {
        self.document.clear();
    }

    /// Replace the document by parsing `source` as `format`.
    pub fn parse_str(&mut self, source: &str, format: Format) -> Result<(), ConfigError> {
        self.document = match format {
            Format::Text => parse_text(source)?,
            Format::Json => parse_json(source)?,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.parsed(format);
        }
        Ok(())
    }

    /// Render the document in the given format.
    pub fn compose(&self, format: Format) -> Result<String, ConfigError> {
        match format {
            Format::Text => Ok(compose_text(&self.document)),
            Format::Json => compose_json(&self.document, self.comments),
        }
    }

    /// Read and parse the file at `path`, replacing the current document.
    pub async fn read(&mut self, path: &Path) -> Result<(), ConfigError> {
        let format = Format::for_reading(path)?;
        debug!(path = %path.display(), ?format, "reading balancer config");
        let source = tokio::fs::read_to_string(path).await?;
        self.parse_str(&source, format)
    }

    /// Compose and write the document to `path`.
    pub async fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let format = Format::for_writing(path);
        debug!(path = %path.display(), ?format, "writing balancer config");
        tokio::fs::write(path, self.compose(format)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::document::GENERAL;
    use crate::section::Section;

    const SOURCE: &str = "global\n    maxconn 256\n\ndefaults\n    mode http\n";

    #[tokio::test]
    async fn test_read_text_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("balancer.cfg");
        tokio::fs::write(&path, SOURCE).await.unwrap();

        let mut store = ConfigStore::new();
        store.read(&path).await.unwrap();
        assert!(
            store
                .document()
                .value(Section::Global, GENERAL, "maxconn")
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_read_unknown_extension_is_hard_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("balancer.conf");
        tokio::fs::write(&path, SOURCE).await.unwrap();

        let mut store = ConfigStore::new();
        let err = store.read(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFormat(ext) if ext == "conf"));
    }

    #[tokio::test]
    async fn test_write_unknown_extension_falls_back_to_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("balancer.backup");

        let mut store = ConfigStore::new();
        store.parse_str(SOURCE, Format::Text).unwrap();
        store.write(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.starts_with("global\n"));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let tmp = TempDir::new().unwrap();

        let mut store = ConfigStore::new();
        store.parse_str(SOURCE, Format::Text).unwrap();

        for file in ["balancer.cfg", "balancer.json"] {
            let path = tmp.path().join(file);
            store.write(&path).await.unwrap();

            let mut reread = ConfigStore::new();
            reread.read(&path).await.unwrap();
            assert_eq!(reread.document(), store.document(), "{file}");
        }
    }

    #[test]
    fn test_observer_sees_parsed_event() {
        #[derive(Default)]
        struct Recorder(Arc<Mutex<Vec<Format>>>);
        impl ParseObserver for Recorder {
            fn parsed(&mut self, format: Format) {
                self.0.lock().unwrap().push(format);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store = ConfigStore::new();
        store.set_observer(Box::new(Recorder(seen.clone())));

        store.parse_str(SOURCE, Format::Text).unwrap();
        store.parse_str("{}", Format::Json).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Format::Text, Format::Json]);
    }

    #[test]
    fn test_reset_clears_document() {
        let mut store = ConfigStore::new();
        store.parse_str(SOURCE, Format::Text).unwrap();
        assert!(!store.document().is_empty());
        store.reset();
        assert!(store.document().is_empty());
    }
}
