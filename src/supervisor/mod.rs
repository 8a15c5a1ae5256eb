//! Backend process supervision.
//!
//! Launches one OS process per configured server, captures its output and
//! watches for exit. Start and stop for the same server are serialised by a
//! per-server async mutex; different servers never block each other.

mod command;
mod config;
mod error;
mod logs;
mod procfs;


pub use command::build_command;
pub use config::SupervisorConfig;
pub use error::{LaunchError, ProcessTerminationError, SupervisorError};
pub use procfs::ProcessUsage;

use crate::registry::{ServerDescriptor, ServerRegistry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use logs::LogSink;
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

const PORT_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of a successful `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Launched { pid: u32 },
    AlreadyRunning { pid: u32 },
}

impl StartOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StartOutcome::Launched { pid } | StartOutcome::AlreadyRunning { pid } => *pid,
        }
    }
}

/// Read-only view of a backend process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: Option<u32>,
    pub alive: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_seconds: Option<u64>,
    /// Exit code of the most recent run that ended
    pub exit_code: Option<i32>,
    pub command: Vec<String>,
}

/// Live process state. The `Child` itself is owned by the exit waiter.
#[derive(Clone)]
struct ProcessHandle {
    pid: u32,
    generation: u64,
    started_at: DateTime<Utc>,
    started: Instant,
    command: Vec<String>,
    exit_rx: watch::Receiver<Option<i32>>,
    kill: CancellationToken,
    logs: CancellationToken,
    stop_requested: Arc<AtomicBool>,
}

impl ProcessHandle {
    fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }
}

/// Owns the fleet's backend processes.
pub struct ProcessSupervisor {
    registry: Arc<ServerRegistry>,
    config: SupervisorConfig,
    forward_output: bool,
    processes: Arc<DashMap<String, ProcessHandle>>,
    last_exit: Arc<DashMap<String, i32>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    generation: AtomicU64,
}

impl ProcessSupervisor {
    pub fn new(registry: Arc<ServerRegistry>, config: SupervisorConfig) -> Self {
        let locks = DashMap::new();
        for server in registry.all() {
            locks.insert(server.name.clone(), Arc::new(Mutex::new(())));
        }

        Self {
            registry,
            config,
            forward_output: true,
            processes: Arc::new(DashMap::new()),
            last_exit: Arc::new(DashMap::new()),
            locks,
            generation: AtomicU64::new(0),
        }
    }

    /// Whether backend output lines are re-emitted as tracing events.
    pub fn with_output_forwarding(mut self, forward: bool) -> Self {
        self.forward_output = forward;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(name.to_string()).or_default().value())
    }

    fn live_handle(&self, name: &str) -> Option<ProcessHandle> {
        self.processes
            .get(name)
            .filter(|handle| handle.is_alive())
            .map(|handle| handle.value().clone())
    }

    /// Launch the backend process for `name`.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::Configuration` for unknown names
    /// - `SupervisorError::ServerDisabled` for disabled servers
    /// - `SupervisorError::Launch` when the port is taken or the spawn fails
    pub async fn start(&self, name: &str) -> Result<StartOutcome, SupervisorError> {
        let server = self.registry.get(name)?;
        if !server.enabled {
            return Err(SupervisorError::ServerDisabled(name.to_string()));
        }

        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        if let Some(handle) = self.live_handle(name) {
            tracing::debug!(server = %name, pid = handle.pid, "Backend already running");
            return Ok(StartOutcome::AlreadyRunning { pid: handle.pid });
        }

        if self.config.check_port_conflict && port_in_use(&server).await {
            return Err(LaunchError::PortInUse {
                server: name.to_string(),
                addr: server.address(),
            }
            .into());
        }

        let argv = build_command(&self.config, &server);
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                server: name.to_string(),
                source,
            })?;

        let pid = child.id().unwrap_or_default();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let logs = CancellationToken::new();
        let kill = CancellationToken::new();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(None);

        let sink = LogSink::open(name, self.forward_output, self.config.log_dir.as_deref()).await;
        if let Some(stdout) = child.stdout.take() {
            logs::spawn_reader(stdout, "stdout", sink.clone(), logs.child_token());
        }
        if let Some(stderr) = child.stderr.take() {
            logs::spawn_reader(stderr, "stderr", sink, logs.child_token());
        }

        self.processes.insert(
            name.to_string(),
            ProcessHandle {
                pid,
                generation,
                started_at: Utc::now(),
                started: Instant::now(),
                command: argv.clone(),
                exit_rx,
                kill: kill.clone(),
                logs: logs.clone(),
                stop_requested: Arc::clone(&stop_requested),
            },
        );

        tokio::spawn(wait_for_exit(ExitWaiter {
            name: name.to_string(),
            generation,
            child,
            exit_tx,
            kill,
            logs,
            stop_requested,
            processes: Arc::clone(&self.processes),
            last_exit: Arc::clone(&self.last_exit),
        }));

        tracing::info!(
            server = %name,
            pid,
            command = %argv.join(" "),
            "Backend process launched"
        );

        Ok(StartOutcome::Launched { pid })
    }

    /// Stop the backend process for `name`.
    ///
    /// Returns `Ok(true)` once the process is gone (or was never running) and
    /// `Ok(false)` only if it survived the forced kill.
    ///
    /// The terminate-then-kill sequence runs on its own task holding the
    /// server's lock, so it completes even if the caller is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Configuration` for unknown names.
    pub async fn stop(&self, name: &str) -> Result<bool, SupervisorError> {
        self.registry.get(name)?;

        let guard = self.lock_for(name).lock_owned().await;

        let Some(handle) = self.live_handle(name) else {
            tracing::debug!(server = %name, "Backend not running");
            return Ok(true);
        };

        let termination = Termination {
            name: name.to_string(),
            handle,
            graceful: self.config.graceful_stop_timeout(),
            force: self.config.force_stop_timeout(),
            processes: Arc::clone(&self.processes),
        };

        match tokio::spawn(termination.run(guard)).await {
            Ok(stopped) => Ok(stopped),
            Err(e) => {
                tracing::error!(server = %name, error = %e, "Stop task failed");
                Ok(false)
            }
        }
    }

    /// Stop every running backend concurrently. True only if all stopped.
    pub async fn stop_all(&self) -> bool {
        let running = self.list_running();
        if running.is_empty() {
            return true;
        }

        tracing::info!(count = running.len(), "Stopping all backend processes");
        let results = join_all(running.iter().map(|name| self.stop(name))).await;
        results.into_iter().all(|result| matches!(result, Ok(true)))
    }

    /// Used by the fleet on exit.
    pub async fn shutdown(&self) -> bool {
        self.stop_all().await
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.live_handle(name).is_some()
    }

    /// Names of servers with a live process, in registry order.
    pub fn list_running(&self) -> Vec<String> {
        self.registry
            .all()
            .iter()
            .filter(|server| self.is_running(&server.name))
            .map(|server| server.name.clone())
            .collect()
    }

    pub fn pid(&self, name: &str) -> Option<u32> {
        self.live_handle(name).map(|handle| handle.pid)
    }

    /// Exit code of the most recent run that ended.
    pub fn last_exit_code(&self, name: &str) -> Option<i32> {
        self.last_exit.get(name).map(|code| *code)
    }

    /// Process details for `name`.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Configuration` for unknown names.
    pub fn get_process_info(&self, name: &str) -> Result<ProcessInfo, SupervisorError> {
        let server = self.registry.get(name)?;
        let exit_code = self.last_exit_code(name);

        Ok(match self.live_handle(name) {
            Some(handle) => ProcessInfo {
                name: server.name.clone(),
                pid: Some(handle.pid),
                alive: true,
                started_at: Some(handle.started_at),
                uptime_seconds: Some(handle.started.elapsed().as_secs()),
                exit_code,
                command: handle.command,
            },
            None => ProcessInfo {
                name: server.name.clone(),
                pid: None,
                alive: false,
                started_at: None,
                uptime_seconds: None,
                exit_code,
                command: build_command(&self.config, &server),
            },
        })
    }

    /// CPU and memory of the live process, where the platform exposes them.
    pub fn process_usage(&self, name: &str) -> Option<ProcessUsage> {
        self.pid(name).and_then(procfs::read_usage)
    }
}

async fn port_in_use(server: &ServerDescriptor) -> bool {
    matches!(
        tokio::time::timeout(PORT_CHECK_TIMEOUT, TcpStream::connect(server.address())).await,
        Ok(Ok(_))
    )
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<(), String> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(|_| format!("pid {} out of range", pid))?;
    signal::kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<(), String> {
    Err("no termination signal on this platform".to_string())
}

/// Wait for the exit code to be published, bounded by `limit`.
async fn await_exit(rx: &mut watch::Receiver<Option<i32>>, limit: Duration) -> Option<i32> {
    let waited = tokio::time::timeout(limit, rx.wait_for(Option::is_some))
        .await
        .map(|result| result.map(|code| *code));

    match waited {
        Ok(Ok(code)) => code,
        // The waiter is gone, and with it the child (kill_on_drop)
        Ok(Err(_)) => {
            let last = *rx.borrow();
            Some(last.unwrap_or(-1))
        }
        Err(_) => None,
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// One stop sequence, detached from the caller.
struct Termination {
    name: String,
    handle: ProcessHandle,
    graceful: Duration,
    force: Duration,
    processes: Arc<DashMap<String, ProcessHandle>>,
}

impl Termination {
    async fn run(self, _guard: OwnedMutexGuard<()>) -> bool {
        let Termination {
            name,
            handle,
            graceful,
            force,
            processes,
        } = self;

        handle.stop_requested.store(true, Ordering::SeqCst);
        tracing::info!(server = %name, pid = handle.pid, "Stopping backend process");

        let mut exit_rx = handle.exit_rx.clone();
        let exited = match send_terminate(handle.pid) {
            Ok(()) => await_exit(&mut exit_rx, graceful).await,
            Err(reason) => {
                tracing::warn!(server = %name, pid = handle.pid, reason = %reason, "Graceful termination unavailable");
                None
            }
        };

        let outcome = match exited {
            Some(code) => Ok(code),
            None => {
                let timeout = ProcessTerminationError::Timeout {
                    server: name.clone(),
                    pid: handle.pid,
                    timeout_ms: graceful.as_millis() as u64,
                };
                tracing::warn!(error = %timeout, "Escalating to forced kill");

                handle.kill.cancel();
                await_exit(&mut exit_rx, force)
                    .await
                    .ok_or(ProcessTerminationError::ForceKillFailed {
                        server: name.clone(),
                        pid: handle.pid,
                    })
            }
        };

        handle.logs.cancel();

        match outcome {
            Ok(code) => {
                processes.remove_if(&name, |_, current| current.generation == handle.generation);
                tracing::info!(server = %name, exit_code = code, "Backend process stopped");
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "Backend process could not be stopped");
                false
            }
        }
    }
}

struct ExitWaiter {
    name: String,
    generation: u64,
    child: Child,
    exit_tx: watch::Sender<Option<i32>>,
    kill: CancellationToken,
    logs: CancellationToken,
    stop_requested: Arc<AtomicBool>,
    processes: Arc<DashMap<String, ProcessHandle>>,
    last_exit: Arc<DashMap<String, i32>>,
}

async fn wait_for_exit(mut waiter: ExitWaiter) {
    let status = tokio::select! {
        status = waiter.child.wait() => status,
        _ = waiter.kill.cancelled() => {
            if let Err(e) = waiter.child.start_kill() {
                tracing::warn!(server = %waiter.name, error = %e, "Failed to kill backend process");
            }
            waiter.child.wait().await
        }
    };

    let code = match status {
        Ok(status) => exit_code(status),
        Err(e) => {
            tracing::warn!(server = %waiter.name, error = %e, "Failed to collect backend exit status");
            -1
        }
    };

    waiter.last_exit.insert(waiter.name.clone(), code);
    let _ = waiter.exit_tx.send(Some(code));
    waiter.logs.cancel();
    waiter
        .processes
        .remove_if(&waiter.name, |_, handle| handle.generation == waiter.generation);

    let requested = waiter.stop_requested.load(Ordering::SeqCst);
    metrics::counter!("fleetgate_backend_exits_total",
        "server" => waiter.name.clone(),
        "requested" => if requested { "true" } else { "false" }
    )
    .increment(1);

    if requested {
        tracing::debug!(server = %waiter.name, exit_code = code, "Backend process exited");
    } else {
        tracing::warn!(
            server = %waiter.name,
            exit_code = code,
            "Backend process exited unexpectedly"
        );
    }
}
