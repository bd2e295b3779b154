//! CLI settings — where to find the balancer and its files.
//!
//! Loaded from a small TOML file; every field has a conventional default
//! so an empty (or absent) file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use helmsman_core::PollPolicy;
use helmsman_core::admin::DEFAULT_SOCKET_PATH;
use helmsman_core::balancer::{BalancerOptions, DEFAULT_CONFIG_PATH};

/// Errors from settings loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level CLI settings.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Balancer locations and invocation options.
    #[serde(default)]
    pub balancer: BalancerSettings,

    /// Polling cadence for drain / reload convergence.
    #[serde(default)]
    pub poll: PollSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where the balancer and its files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerSettings {
    /// Admin socket path.
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    /// Configuration file path.
    #[serde(default = "default_config")]
    pub config: PathBuf,

    /// Balancer executable; resolved from `PATH` when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Pid-file location.
    #[serde(default)]
    pub pid_file: Option<PathBuf>,

    /// Elevated-privilege wrapper prepended to every shell command.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Try to find a running instance at startup.
    #[serde(default)]
    pub discover: bool,
}

impl Default for BalancerSettings {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            config: default_config(),
            binary: None,
            pid_file: None,
            prefix: None,
            discover: false,
        }
    }
}

fn default_socket() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_config() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Polling cadence and deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Interval between convergence checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Give up waiting for convergence after this many seconds.
    #[serde(default = "default_poll_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            deadline_secs: default_poll_deadline_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_poll_deadline_secs() -> u64 {
    30
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from a TOML file using async I/O.
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string.
    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.poll.interval_ms == 0 {
            return Err(SettingsError::Validation(
                "poll.interval_ms must be non-zero".to_string(),
            ));
        }
        if self.poll.deadline_secs == 0 {
            return Err(SettingsError::Validation(
                "poll.deadline_secs must be non-zero".to_string(),
            ));
        }
        if self.balancer.socket.as_os_str().is_empty() {
            return Err(SettingsError::Validation(
                "balancer.socket must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build [`BalancerOptions`] from these settings.
    pub fn balancer_options(&self) -> BalancerOptions {
        BalancerOptions {
            socket: Some(self.balancer.socket.clone()),
            config: Some(self.balancer.config.clone()),
            binary: self.balancer.binary.clone(),
            pid: None,
            pid_file: self.balancer.pid_file.clone(),
            prefix: self.balancer.prefix.clone(),
            discover: self.balancer.discover,
            poll: Some(PollPolicy {
                interval: Duration::from_millis(self.poll.interval_ms),
                deadline: Duration::from_secs(self.poll.deadline_secs),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.balancer.socket, PathBuf::from("/tmp/haproxy.sock"));
        assert_eq!(
            settings.balancer.config,
            PathBuf::from("/etc/haproxy/haproxy.cfg")
        );
        assert_eq!(settings.poll.interval_ms, 100);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(!settings.balancer.discover);
        assert_eq!(settings.poll.deadline_secs, 30);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [balancer]
            socket = "/run/haproxy/admin.sock"
            config = "/etc/haproxy/staging.cfg"
            prefix = "sudo"
            discover = true

            [poll]
            interval_ms = 250
            deadline_secs = 60

            [logging]
            level = "debug"
        "#;
        let settings = Settings::parse(toml).unwrap();
        assert_eq!(
            settings.balancer.socket,
            PathBuf::from("/run/haproxy/admin.sock")
        );
        assert_eq!(settings.balancer.prefix.as_deref(), Some("sudo"));
        assert!(settings.balancer.discover);
        assert_eq!(settings.poll.interval_ms, 250);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let result = Settings::parse("[poll]\ninterval_ms = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_empty_socket() {
        let result = Settings::parse("[balancer]\nsocket = \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_options_carry_poll_policy() {
        let settings = Settings::parse("[poll]\ninterval_ms = 250\n").unwrap();
        let options = settings.balancer_options();
        let poll = options.poll.expect("poll policy set");
        assert_eq!(poll.interval, Duration::from_millis(250));
        assert_eq!(poll.deadline, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("helmsman.toml");
        tokio::fs::write(&path, b"[balancer]\ndiscover = true\n")
            .await
            .unwrap();

        let settings = Settings::load(&path).await.unwrap();
        assert!(settings.balancer.discover);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = Settings::load(Path::new("/nonexistent/helmsman.toml")).await;
        assert!(result.is_err());
    }
}
