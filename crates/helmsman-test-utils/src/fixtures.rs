//! Canned configuration fixtures.

use std::path::PathBuf;

use helmsman_config::{Document, GENERAL, Section};
use tempfile::TempDir;

/// A small but realistic balancer configuration in the text format.
pub const SAMPLE_CONFIG: &str = "\
global
    daemon
    maxconn 4096
    log 127.0.0.1 local0

defaults
    mode http
    timeout connect 5000ms
    timeout client 50000ms
    timeout server 50000ms

# public entry point
frontend http-in
    bind *:80
    default_backend servers

backend servers
    balance roundrobin
    server app1 127.0.0.1:8081 maxconn 32
    server app2 127.0.0.1:8082 maxconn 32
";

/// The same configuration built programmatically through the document API.
pub fn sample_document() -> Document {
    let mut doc = Document::new();
    let set = |doc: &mut Document, section, name: &str, key: &str, value: &str| {
        doc.set(section, name, key, value)
            .map(|_| ())
            .expect("fixture keys are allowed");
    };
    let add = |doc: &mut Document, section, name: &str, key: &str, value: &str| {
        doc.add(section, name, key, value)
            .map(|_| ())
            .expect("fixture keys are allowed");
    };

    set(&mut doc, Section::Global, GENERAL, "daemon", "");
    set(&mut doc, Section::Global, GENERAL, "maxconn", "4096");
    set(&mut doc, Section::Global, GENERAL, "log", "127.0.0.1 local0");
    set(&mut doc, Section::Defaults, GENERAL, "mode", "http");
    set(&mut doc, Section::Defaults, GENERAL, "timeout connect", "5000ms");
    doc.comment(Section::Frontend, "http-in", helmsman_config::PRE, "public entry point")
        .expect("pre comments are always accepted");
    set(&mut doc, Section::Frontend, "http-in", "bind", "*:80");
    set(&mut doc, Section::Frontend, "http-in", "default_backend", "servers");
    set(&mut doc, Section::Backend, "servers", "balance", "roundrobin");
    add(&mut doc, Section::Backend, "servers", "server", "app1 127.0.0.1:8081 maxconn 32");
    add(&mut doc, Section::Backend, "servers", "server", "app2 127.0.0.1:8082 maxconn 32");
    doc
}

/// [`SAMPLE_CONFIG`] written to an owned temp directory.
///
/// The directory is deleted when this value is dropped, guaranteeing
/// cleanup even on panic.
pub struct SampleConfigFile {
    pub path: PathBuf,
    temp_dir: TempDir,
}

impl SampleConfigFile {
    /// Write the sample config as `balancer.cfg` in a fresh temp dir.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("balancer.cfg");
        tokio::fs::write(&path, SAMPLE_CONFIG)
            .await
            .expect("failed to write sample config");
        Self {
            path,
            temp_dir,
        }
    }

    /// Path of a sibling file with the given name in the same temp dir.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
