//! Process orchestrator — drives the balancer's OS process lifecycle.
//!
//! The orchestrator locates the balancer's pid, verifies candidate
//! configurations, and launches, reloads, and stops the daemon. Where the
//! operating system gives no synchronous acknowledgment (graceful drain,
//! reload hand-off), convergence is observed by polling, bounded by a
//! configurable deadline.
//!
//! Shell-out discipline, applied to every invocation: a non-zero exit is a
//! hard failure; a zero exit that wrote to stderr is a soft failure
//! ([`OrchestratorError::Stderr`]), tolerated only where documented
//! (start warnings) and an error everywhere else (verify in particular).

pub mod runner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use runner::{CommandRunner, RunOutput, ShellRunner};

/// Conventional pid-file location used when none is configured.
pub const DEFAULT_PID_FILE: &str = "/var/run/haproxy.pid";

/// Where the orchestrator believes the balancer process is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No pid known.
    Unknown,
    /// Launch in flight.
    Starting,
    /// A pid is tracked and assumed alive.
    Running,
    /// Graceful drain signalled; waiting for the process table to clear.
    SoftStopping,
    /// Replacement instance launched; waiting for the pid to change.
    Reloading,
    /// Termination signalled.
    Stopping,
    /// Confirmed stopped; pid cleared.
    Stopped,
}

/// Fixed-interval polling bounded by a deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            deadline: Duration::from_secs(30),
        }
    }
}

/// Errors from orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command:?} exited with status {status}: {stderr}")]
    Exit {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Zero exit, but the command wrote to stderr.
    #[error("{command:?} reported: {stderr}")]
    Stderr { command: String, stderr: String },

    #[error("failed to read pid file {path}: {source}")]
    PidFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create pid file directory {path}: {source}")]
    PidFileDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Polling did not converge before the deadline.
    #[error("timed out waiting for {waiting_for} after {elapsed:?}")]
    PollTimeout {
        waiting_for: &'static str,
        elapsed: Duration,
    },
}

/// Drives one balancer process: verify, start, reload, stop, discover.
pub struct Orchestrator {
    binary: PathBuf,
    process_name: String,
    config: PathBuf,
    pid_file: Option<PathBuf>,
    prefix: Option<String>,
    pid: Option<u32>,
    state: LifecycleState,
    poll: PollPolicy,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    /// Create an orchestrator for the balancer binary and config file.
    pub fn new(binary: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        let process_name = binary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary.display().to_string());
        Self {
            binary,
            process_name,
            config: config.into(),
            pid_file: None,
            prefix: None,
            pid: None,
            state: LifecycleState::Unknown,
            poll: PollPolicy::default(),
            runner: Arc::new(ShellRunner),
        }
    }

    pub fn with_pid_file(mut self, pid_file: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(pid_file.into());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self.state = LifecycleState::Running;
        self
    }

    /// Prepend every shell command with the given prefix (e.g. `sudo`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Replace the command runner (tests script outcomes through this).
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Last known pid.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Run a shell command under the failure discipline: spawn failures and
    /// non-zero exits are hard errors, zero-exit stderr is a soft error.
    async fn run(&self, command: String) -> Result<String, OrchestratorError> {
        let command = match &self.prefix {
            Some(prefix) => format!("{prefix} {command}"),
            None => command,
        };
        debug!(command = %command, "shelling out");

        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|source| OrchestratorError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = output.stdout.trim().to_string();
        let stderr = output.stderr.trim().to_string();

        if output.status != 0 {
            return Err(OrchestratorError::Exit {
                command,
                status: output.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            return Err(OrchestratorError::Stderr { command, stderr });
        }
        Ok(stdout)
    }

    /// Check the configured file with the balancer's built-in config-check
    /// mode. Any stderr content is a failure, even on a zero exit.
    pub async fn verify(&self) -> Result<(), OrchestratorError> {
        let config = self.config.clone();
        self.verify_path(&config).await
    }

    /// Check an arbitrary candidate configuration file.
    pub async fn verify_path(&self, config: &Path) -> Result<(), OrchestratorError> {
        self.run(format!(
            "{} -c -f {}",
            self.binary.display(),
            config.display()
        ))
        .await
        .map(|_| ())
    }

    /// Launch the balancer daemonized.
    ///
    /// Verifies the configuration first and aborts on its failure. A zero
    /// exit that wrote to stderr is a non-fatal warning, returned to the
    /// caller. The pid is re-read before returning; discovery failures at
    /// that point are ignored.
    pub async fn start(&mut self) -> Result<Option<String>, OrchestratorError> {
        let pid_file = self
            .pid_file
            .get_or_insert_with(|| PathBuf::from(DEFAULT_PID_FILE))
            .clone();
        if let Some(dir) = pid_file.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| OrchestratorError::PidFileDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        self.verify().await?;
        self.state = LifecycleState::Starting;

        let command = format!(
            "{} -D -f {} -p {}",
            self.binary.display(),
            self.config.display(),
            pid_file.display()
        );
        let warnings = match self.run(command).await {
            Ok(_) => None,
            Err(OrchestratorError::Stderr { stderr, .. }) => {
                warn!(warnings = %stderr, "balancer started with warnings");
                Some(stderr)
            }
            Err(err) => {
                self.state = LifecycleState::Unknown;
                return Err(err);
            }
        };

        // Pick up the pid the daemon just wrote; not fatal if it is slow.
        let _ = self.read().await;
        self.state = LifecycleState::Running;
        info!(pid = ?self.pid, "balancer started");
        Ok(warnings)
    }

    /// Stop the balancer without waiting for connections to finish.
    ///
    /// With a cached pid (and `all` false), signals exactly that process,
    /// escalating to a forced kill only when the graceful signal fails.
    /// With `all`, terminates every balancer instance system-wide. The
    /// cached pid is cleared on success.
    pub async fn stop(&mut self, all: bool) -> Result<(), OrchestratorError> {
        self.state = LifecycleState::Stopping;

        if let (Some(pid), false) = (self.pid, all) {
            if let Err(graceful) = self.run(format!("kill {pid}")).await {
                debug!(pid, error = %graceful, "graceful signal failed, escalating");
                self.run(format!("kill -9 {pid}")).await?;
            }
        } else {
            self.run(format!("killall {}", self.process_name)).await?;
        }

        self.pid = None;
        self.state = LifecycleState::Stopped;
        info!("balancer stopped");
        Ok(())
    }

    /// Gracefully drain every balancer instance.
    ///
    /// The drain signal gets no synchronous acknowledgment; completion is
    /// observable only by polling the process table until [`Self::running`]
    /// reports false.
    pub async fn softstop(&mut self) -> Result<(), OrchestratorError> {
        self.run(format!("killall -USR1 {}", self.process_name))
            .await?;
        self.state = LifecycleState::SoftStopping;

        let started = Instant::now();
        loop {
            if !self.running().await? {
                break;
            }
            if started.elapsed() >= self.poll.deadline {
                return Err(OrchestratorError::PollTimeout {
                    waiting_for: "graceful drain",
                    elapsed: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }

        self.pid = None;
        self.state = LifecycleState::Stopped;
        info!("balancer drained");
        Ok(())
    }

    /// Reload by launching a replacement instance that takes over from the
    /// tracked pid — gracefully (`-sf`) or by terminating the predecessor
    /// immediately (`-st`). The configuration is re-verified first, and
    /// success is declared only once the tracked pid is observed to change
    /// from its pre-reload value.
    pub async fn reload(&mut self, hard: bool) -> Result<(), OrchestratorError> {
        self.verify().await?;

        let previous = self.pid;
        let pid_file = self
            .pid_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_FILE));
        let flag = if hard { "-st" } else { "-sf" };
        let command = format!(
            "{} -D -f {} -p {} {} {}",
            self.binary.display(),
            self.config.display(),
            pid_file.display(),
            flag,
            previous.map(|pid| pid.to_string()).unwrap_or_default()
        )
        .trim_end()
        .to_string();

        self.state = LifecycleState::Reloading;
        self.run(command).await?;

        let started = Instant::now();
        loop {
            if self.read().await? != previous {
                break;
            }
            if started.elapsed() >= self.poll.deadline {
                return Err(OrchestratorError::PollTimeout {
                    waiting_for: "reload hand-off",
                    elapsed: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }

        self.state = LifecycleState::Running;
        info!(pid = ?self.pid, hard, "balancer reloaded");
        Ok(())
    }

    /// Whether a balancer instance is running.
    ///
    /// Attempts discovery first when no pid is cached. An undiscoverable
    /// process reports `false`, never an error.
    pub async fn running(&mut self) -> Result<bool, OrchestratorError> {
        if self.pid.is_none() {
            match self.read().await {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return Ok(false),
            }
        }
        let Some(pid) = self.pid else {
            return Ok(false);
        };
        Ok(self.run(format!("ps -p {pid} -o args=")).await.is_ok())
    }

    /// Resolve the current pid: the configured pid file is authoritative;
    /// otherwise the process table is scanned for the balancer's command
    /// name (the scan excludes its own entry) and the first match wins.
    pub async fn read(&mut self) -> Result<Option<u32>, OrchestratorError> {
        if let Some(pid_file) = self.pid_file.clone() {
            let contents = tokio::fs::read_to_string(&pid_file).await.map_err(|source| {
                OrchestratorError::PidFile {
                    path: pid_file,
                    source,
                }
            })?;
            self.track(contents.lines().next().unwrap_or_default().trim().parse().ok());
            return Ok(self.pid);
        }

        let stdout = self.run(format!("pgrep {}", self.process_name)).await?;
        self.track(stdout.lines().next().and_then(|line| line.trim().parse().ok()));
        Ok(self.pid)
    }

    /// Discover the pid unless one is already tracked.
    pub async fn discover(&mut self) -> Result<Option<u32>, OrchestratorError> {
        match self.pid {
            Some(pid) => Ok(Some(pid)),
            None => self.read().await,
        }
    }

    fn track(&mut self, pid: Option<u32>) {
        self.pid = pid;
        match (self.pid, self.state) {
            (Some(_), LifecycleState::Unknown | LifecycleState::Stopped) => {
                self.state = LifecycleState::Running;
            }
            (None, LifecycleState::Running) => self.state = LifecycleState::Unknown,
            _ => {}
        }
    }
}
