//! Facade composing the admin client, the config store, and the
//! orchestrator into one balancer handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::debug;

use helmsman_config::{ConfigError, ConfigStore};

use crate::admin::{AdminClient, AdminError, DEFAULT_SOCKET_PATH, Decoder, DownEvent, Reply, render};
use crate::orchestrator::{
    CommandRunner, LifecycleState, Orchestrator, OrchestratorError, PollPolicy,
};

/// Conventional balancer configuration location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/haproxy/haproxy.cfg";

/// Command name used for binary resolution and process-table queries.
pub const PROCESS_NAME: &str = "haproxy";

/// Construction options for [`Balancer`]. Every field has a conventional
/// default; the binary is resolved from `PATH` when not given.
#[derive(Debug, Default)]
pub struct BalancerOptions {
    /// Admin socket path (default `/tmp/haproxy.sock`).
    pub socket: Option<PathBuf>,
    /// Configuration file (default `/etc/haproxy/haproxy.cfg`).
    pub config: Option<PathBuf>,
    /// Balancer executable (default: resolve `haproxy` from `PATH`).
    pub binary: Option<PathBuf>,
    /// Known pid of a running instance.
    pub pid: Option<u32>,
    /// Pid-file location.
    pub pid_file: Option<PathBuf>,
    /// Elevated-privilege wrapper prepended to every shell command.
    pub prefix: Option<String>,
    /// Try to find a running instance at construction time.
    pub discover: bool,
    /// Polling cadence and deadline for drain / reload convergence.
    pub poll: Option<PollPolicy>,
}

/// Errors surfaced by the facade.
#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("balancer binary not found on PATH: {0}")]
    BinaryNotFound(#[from] which::Error),

    #[error("unexpected reply shape for {command:?}")]
    UnexpectedReply { command: String },
}

/// A server's current and initially-configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerWeight {
    pub current: u32,
    pub initial: u32,
}

/// Control-plane handle for one balancer: admin commands over the unix
/// socket, the in-memory configuration document, and process lifecycle.
pub struct Balancer {
    admin: AdminClient,
    store: ConfigStore,
    orchestrator: Orchestrator,
    config_path: PathBuf,
}

impl Balancer {
    /// Build a balancer handle. Resolves the binary from `PATH` when not
    /// configured, and — when `discover` is set — makes a best-effort
    /// attempt to find a running instance's pid.
    pub async fn new(options: BalancerOptions) -> Result<Self, BalancerError> {
        let binary = match options.binary {
            Some(binary) => binary,
            None => which::which(PROCESS_NAME)?,
        };
        let config_path = options
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut orchestrator = Orchestrator::new(binary, &config_path);
        if let Some(pid_file) = options.pid_file {
            orchestrator = orchestrator.with_pid_file(pid_file);
        }
        if let Some(pid) = options.pid {
            orchestrator = orchestrator.with_pid(pid);
        }
        if let Some(prefix) = options.prefix {
            orchestrator = orchestrator.with_prefix(prefix);
        }
        if let Some(poll) = options.poll {
            orchestrator = orchestrator.with_poll_policy(poll);
        }

        let mut balancer = Self {
            admin: AdminClient::new(
                options
                    .socket
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
            ),
            store: ConfigStore::new(),
            orchestrator,
            config_path,
        };

        if options.discover {
            // Best effort; an undiscoverable instance is not an error here.
            let _ = balancer.orchestrator.discover().await;
        }

        Ok(balancer)
    }

    /// Replace the orchestrator's command runner (tests script outcomes).
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.orchestrator = self.orchestrator.with_runner(runner);
        self
    }

    pub fn admin(&self) -> &AdminClient {
        &self.admin
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn pid(&self) -> Option<u32> {
        self.orchestrator.pid()
    }

    pub fn state(&self) -> LifecycleState {
        self.orchestrator.state()
    }

    /// Subscribe to "balancer down" notifications raised when the admin
    /// socket is unreachable at connect time.
    pub fn subscribe_down(&self) -> tokio::sync::broadcast::Receiver<DownEvent> {
        self.admin.subscribe_down()
    }

    // ── Configuration ──────────────────────────────────────────────────

    /// Read the balancer configuration into the in-memory document.
    pub async fn load(&mut self, path: Option<&Path>) -> Result<(), BalancerError> {
        let path = path.unwrap_or(&self.config_path).to_path_buf();
        Ok(self.store.read(&path).await?)
    }

    /// Write the in-memory document back out.
    pub async fn save(&self, path: Option<&Path>) -> Result<(), BalancerError> {
        let path = path.unwrap_or(&self.config_path);
        Ok(self.store.write(path).await?)
    }

    /// Check the on-disk configuration with the balancer's config-check
    /// mode.
    pub async fn verify(&self) -> Result<(), BalancerError> {
        Ok(self.orchestrator.verify().await?)
    }

    /// Check the in-memory document: compose it to a scratch file, run the
    /// balancer's config-check mode against that, then clean up.
    pub async fn verify_staged(&self) -> Result<(), BalancerError> {
        static SCRATCH: AtomicU64 = AtomicU64::new(0);
        let scratch = std::env::temp_dir().join(format!(
            "helmsman-verify-{}-{}.cfg",
            std::process::id(),
            SCRATCH.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&scratch, self.store.compose(helmsman_config::Format::Text)?)
            .await
            .map_err(ConfigError::Io)?;
        let verdict = self.orchestrator.verify_path(&scratch).await;
        // Scratch files are uniquely named; removal is only tidiness.
        let _ = tokio::fs::remove_file(&scratch).await;
        Ok(verdict?)
    }

    // ── Process lifecycle ──────────────────────────────────────────────

    /// Start the balancer daemonized; returns launch warnings, if any.
    pub async fn start(&mut self) -> Result<Option<String>, BalancerError> {
        Ok(self.orchestrator.start().await?)
    }

    /// Stop the tracked instance, or every instance when `all`.
    pub async fn stop(&mut self, all: bool) -> Result<(), BalancerError> {
        Ok(self.orchestrator.stop(all).await?)
    }

    /// Gracefully drain all instances, polling until they are gone.
    pub async fn softstop(&mut self) -> Result<(), BalancerError> {
        Ok(self.orchestrator.softstop().await?)
    }

    /// Reload with graceful (`hard = false`) or immediate predecessor
    /// termination.
    pub async fn reload(&mut self, hard: bool) -> Result<(), BalancerError> {
        Ok(self.orchestrator.reload(hard).await?)
    }

    /// Whether a balancer instance is running.
    pub async fn running(&mut self) -> Result<bool, BalancerError> {
        Ok(self.orchestrator.running().await?)
    }

    // ── Admin commands ─────────────────────────────────────────────────

    async fn acknowledged(&self, line: String) -> Result<(), BalancerError> {
        debug!(command = %line, "admin command");
        self.admin.command(line).run().await?;
        Ok(())
    }

    /// Clear the max statistics counters, or all counters when `all`.
    pub async fn clear_counters(&self, all: bool) -> Result<(), BalancerError> {
        self.acknowledged(render("clear counters %s", &[if all { "all" } else { "" }]))
            .await
    }

    /// Mark a backend server as DOWN for maintenance.
    pub async fn disable_server(&self, backend: &str, server: &str) -> Result<(), BalancerError> {
        self.acknowledged(render("disable server %s/%s", &[backend, server]))
            .await
    }

    /// Re-enable a server previously marked as DOWN.
    pub async fn enable_server(&self, backend: &str, server: &str) -> Result<(), BalancerError> {
        self.acknowledged(render("enable server %s/%s", &[backend, server]))
            .await
    }

    /// Temporarily stop a frontend; it releases its port but can be
    /// resumed.
    pub async fn pause_frontend(&self, frontend: &str) -> Result<(), BalancerError> {
        self.acknowledged(render("disable frontend %s", &[frontend]))
            .await
    }

    /// Resume a paused frontend.
    pub async fn resume_frontend(&self, frontend: &str) -> Result<(), BalancerError> {
        self.acknowledged(render("enable frontend %s", &[frontend]))
            .await
    }

    /// Show captured request/response errors, optionally for one proxy id.
    pub async fn errors(&self, id: Option<&str>) -> Result<Reply, BalancerError> {
        Ok(self
            .admin
            .command(render("show errors %s", &[id.unwrap_or_default()]))
            .run()
            .await?)
    }

    /// Current and initial weight of a server.
    pub async fn weight(&self, backend: &str, server: &str) -> Result<ServerWeight, BalancerError> {
        let command = render("get weight %s/%s", &[backend, server]);
        match self.admin.command(&command).run().await? {
            Reply::Weight { current, initial } => Ok(ServerWeight { current, initial }),
            _ => Err(BalancerError::UnexpectedReply { command }),
        }
    }

    /// Set a server's weight.
    pub async fn set_weight(
        &self,
        backend: &str,
        server: &str,
        weight: u32,
    ) -> Result<(), BalancerError> {
        self.acknowledged(render(
            "set weight %s/%s %d",
            &[backend, server, &weight.to_string()],
        ))
        .await
    }

    /// Change the process-wide maxconn setting.
    pub async fn maxconn_global(&self, value: u32) -> Result<(), BalancerError> {
        self.acknowledged(render("set maxconn global %d", &[&value.to_string()]))
            .await
    }

    /// Change a frontend's maxconn setting.
    pub async fn maxconn_frontend(&self, frontend: &str, value: u32) -> Result<(), BalancerError> {
        self.acknowledged(render(
            "set maxconn frontend %s %d",
            &[frontend, &value.to_string()],
        ))
        .await
    }

    /// Change the process-wide connection rate limit; `0` disables it.
    pub async fn rate_limit_connections(&self, value: u32) -> Result<(), BalancerError> {
        self.acknowledged(render(
            "set rate-limit connections global %d",
            &[&value.to_string()],
        ))
        .await
    }

    /// Change the maximum HTTP compression rate, in kilobytes per second.
    pub async fn compression_rate(&self, value: u32) -> Result<(), BalancerError> {
        self.acknowledged(render(
            "set rate-limit http-compression global %d",
            &[&value.to_string()],
        ))
        .await
    }

    /// Balancer status information as a field map.
    pub async fn info(&self) -> Result<IndexMap<String, serde_json::Value>, BalancerError> {
        let command = "show info".to_string();
        match self.admin.command(&command).run().await? {
            Reply::Fields(map) => Ok(map),
            Reply::Done => Ok(IndexMap::new()),
            _ => Err(BalancerError::UnexpectedReply { command }),
        }
    }

    /// Dump known sessions, or one session by id.
    pub async fn sessions(&self, id: Option<&str>) -> Result<Reply, BalancerError> {
        Ok(self
            .admin
            .command(render("show sess %s", &[id.unwrap_or_default()]))
            .run()
            .await?)
    }

    /// Dump statistics rows. `-1` for any selector means "everything";
    /// `kind` is a bitmask of 1 = frontends, 2 = backends, 4 = servers.
    pub async fn stat(
        &self,
        id: i32,
        kind: i32,
        sid: i32,
    ) -> Result<Vec<IndexMap<String, String>>, BalancerError> {
        let command = render(
            "show stat %d %d %d",
            &[&id.to_string(), &kind.to_string(), &sid.to_string()],
        );
        match self
            .admin
            .command(&command)
            .decode(Decoder::Table)
            .run()
            .await?
        {
            Reply::Table(rows) => Ok(rows),
            Reply::Done => Ok(Vec::new()),
            _ => Err(BalancerError::UnexpectedReply { command }),
        }
    }
}

#[cfg(test)]
mod tests {
    use helmsman_config::Section;
    use crate::fake_runner::FakeRunner;
    use helmsman_test_utils::fixtures;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    async fn balancer_at(socket: PathBuf) -> Balancer {
        Balancer::new(BalancerOptions {
            socket: Some(socket),
            binary: Some(PathBuf::from("/usr/sbin/haproxy")),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    /// Serve `responses.len()` connections, recording each command line.
    fn spawn_admin(
        listener: UnixListener,
        responses: Vec<&'static str>,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut received = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut command = String::new();
                stream.read_to_string(&mut command).await.unwrap();
                received.push(command.trim_end().to_string());
                stream.write_all(response.as_bytes()).await.unwrap();
            }
            received
        })
    }

    #[tokio::test]
    async fn test_typed_commands_format_exact_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let socket = tmp.path().join("admin.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = spawn_admin(listener, vec![""; 5]);

        let balancer = balancer_at(socket).await;
        balancer.disable_server("be", "srv").await.unwrap();
        balancer.set_weight("be", "srv", 5).await.unwrap();
        balancer.clear_counters(false).await.unwrap();
        balancer.clear_counters(true).await.unwrap();
        balancer.pause_frontend("www").await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            vec![
                "disable server be/srv",
                "set weight be/srv 5",
                "clear counters",
                "clear counters all",
                "disable frontend www",
            ]
        );
    }

    #[tokio::test]
    async fn test_weight_query_decodes_the_pair() {
        let tmp = tempfile::TempDir::new().unwrap();
        let socket = tmp.path().join("admin.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = spawn_admin(listener, vec!["5 (initial 1)\n"]);

        let balancer = balancer_at(socket).await;
        let weight = balancer.weight("be", "srv").await.unwrap();
        assert_eq!(
            weight,
            ServerWeight {
                current: 5,
                initial: 1
            }
        );
        assert_eq!(server.await.unwrap(), vec!["get weight be/srv"]);
    }

    #[tokio::test]
    async fn test_info_returns_coerced_fields() {
        let tmp = tempfile::TempDir::new().unwrap();
        let socket = tmp.path().join("admin.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = spawn_admin(listener, vec!["Name: haproxy\nMaxconn: 2000\n"]);

        let balancer = balancer_at(socket).await;
        let info = balancer.info().await.unwrap();
        server.await.unwrap();

        assert_eq!(info.get("Maxconn"), Some(&serde_json::Value::from(2000)));
    }

    #[tokio::test]
    async fn test_stat_decodes_table_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let socket = tmp.path().join("admin.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = spawn_admin(listener, vec!["# pxname,svname,scur,\nwww,FRONTEND,3,\n"]);

        let balancer = balancer_at(socket).await;
        let rows = balancer.stat(-1, -1, -1).await.unwrap();
        assert_eq!(server.await.unwrap(), vec!["show stat -1 -1 -1"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("pxname").map(String::as_str), Some("www"));
    }

    #[tokio::test]
    async fn test_verify_staged_checks_a_scratch_copy_and_cleans_up() {
        let runner = std::sync::Arc::new(FakeRunner::new().expect_ok("-c -f", ""));
        let tmp = tempfile::TempDir::new().unwrap();
        let mut balancer = balancer_at(tmp.path().join("unused.sock"))
            .await
            .with_runner(runner.clone());

        *balancer.store_mut().document_mut() = fixtures::sample_document();
        balancer.verify_staged().await.unwrap();

        let call = &runner.calls()[0];
        let scratch = call
            .split(" -c -f ")
            .nth(1)
            .expect("check command names the scratch file");
        assert!(scratch.contains("helmsman-verify-"));
        assert!(
            !std::path::Path::new(scratch).exists(),
            "scratch file removed"
        );
    }

    #[tokio::test]
    async fn test_load_and_save_round_trip() {
        let sample = fixtures::SampleConfigFile::new().await;
        let tmp = tempfile::TempDir::new().unwrap();
        let mut balancer = Balancer::new(BalancerOptions {
            socket: Some(tmp.path().join("unused.sock")),
            binary: Some(PathBuf::from("/usr/sbin/haproxy")),
            config: Some(sample.path.clone()),
            ..Default::default()
        })
        .await
        .unwrap();

        balancer.load(None).await.unwrap();
        assert!(
            balancer
                .store()
                .document()
                .proxy(Section::Backend, "servers")
                .is_some()
        );

        let staged = sample.sibling("staged.json");
        balancer.save(Some(&staged)).await.unwrap();
        let json = tokio::fs::read_to_string(&staged).await.unwrap();
        assert!(json.contains("\"backend\""));
    }

    #[tokio::test]
    async fn test_discover_is_best_effort() {
        // pgrep finds nothing for a process name that cannot exist;
        // construction still succeeds with no pid tracked.
        let balancer = Balancer::new(BalancerOptions {
            binary: Some(PathBuf::from("/usr/sbin/helmsman-no-such-binary")),
            discover: true,
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(balancer.pid(), None);
        assert_eq!(balancer.state(), LifecycleState::Unknown);
    }
}
