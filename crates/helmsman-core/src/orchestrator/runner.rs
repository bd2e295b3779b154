//! Shell-command execution seam for the orchestrator.
//!
//! Every balancer invocation — config check, daemonized start, reload,
//! signals, process-table queries — goes through [`CommandRunner`], so
//! tests can script outcomes without a balancer binary installed.

use std::process::Stdio;

use crate::BoxFuture;

/// Raw capture of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit status (`-1` when terminated by a signal).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// A clean zero-exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Executes a shell command and captures its outcome.
pub trait CommandRunner: Send + Sync {
    /// Run `command`, resolving once the process has exited.
    fn run(&self, command: &str) -> BoxFuture<'_, std::io::Result<RunOutput>>;
}

/// Production runner: `sh -c <command>` via tokio's process support, so an
/// elevated-privilege prefix (`sudo …`) composes with the command text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> BoxFuture<'_, std::io::Result<RunOutput>> {
        let command = command.to_string();
        Box::pin(async move {
            let output = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await?;

            Ok(RunOutput {
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}
