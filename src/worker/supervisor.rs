//! Lifecycle management for the worker process.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::drain::OutputDrain;
use super::error::{WorkerError, WorkerResult};
use super::port::PortAllocator;
use super::protocol::{base_url, VERSION_PATH};
use crate::config::{SettingsError, WorkerSettings};

/// Bytes of worker output included in startup failure logs.
const FAILURE_TAIL_BYTES: usize = 2048;

/// Lifecycle state of the supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No worker process exists.
    Stopped,
    /// Spawned, waiting for the readiness probe.
    Starting,
    /// Answered the readiness probe.
    Running,
    /// The last start attempt failed; requests are refused until a restart.
    FailedToStart,
}

/// Program, arguments and environment used to launch the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    /// `<runtime> <jvm_args..> -jar <artifact> -p <port> <extra_args..>`
    pub fn new(settings: &WorkerSettings, artifact: &Path, port: u16) -> WorkerResult<Self> {
        let mut args = settings.jvm_args.clone();
        args.push("-jar".to_string());
        args.push(artifact.to_string_lossy().into_owned());
        args.push("-p".to_string());
        args.push(port.to_string());
        args.extend(settings.extra_args.iter().cloned());
        args.retain(|arg| !arg.is_empty());

        let env = settings.resolved_env()?;

        Ok(Self {
            program: settings.runtime.clone(),
            args,
            env,
        })
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// One live worker instance.
struct WorkerProcess {
    child: Child,
    port: u16,
    started_at: Instant,
    drain: OutputDrain,
}

/// Launches, health-checks, monitors and terminates the worker process.
///
/// At most one worker exists per supervisor. The child is spawned with
/// `kill_on_drop`, so dropping the supervisor never leaks a worker.
///
/// # Example
///
/// ```ignore
/// use isotika::config::WorkerSettings;
/// use isotika::worker::ProcessSupervisor;
///
/// let mut supervisor = ProcessSupervisor::new(WorkerSettings::default(), "tika-server-1.5.jar")?;
/// let port = supervisor.start().await?;
/// assert!(supervisor.is_running());
/// supervisor.stop().await;
/// ```
pub struct ProcessSupervisor {
    settings: WorkerSettings,
    artifact: PathBuf,
    ports: PortAllocator,
    probe: reqwest::Client,
    state: WorkerState,
    process: Option<WorkerProcess>,
    restarts: u64,
}

impl ProcessSupervisor {
    /// Create a stopped supervisor for the given jar.
    pub fn new(settings: WorkerSettings, artifact: impl Into<PathBuf>) -> WorkerResult<Self> {
        let host: IpAddr = settings.host.parse().map_err(|_| {
            SettingsError::InvalidConfig(format!(
                "worker.host {:?} must be an IP address",
                settings.host
            ))
        })?;
        let probe = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(WorkerError::transport)?;

        Ok(Self {
            ports: PortAllocator::new(host, settings.max_port),
            settings,
            artifact: artifact.into(),
            probe,
            state: WorkerState::Stopped,
            process: None,
            restarts: 0,
        })
    }

    /// Launch the worker and wait until it answers the readiness probe.
    ///
    /// Does nothing if a live worker is already running. Returns the port the
    /// worker listens on.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::PortExhausted`] if no port is free
    /// - [`WorkerError::SpawnFailed`] if the runtime cannot be executed
    /// - [`WorkerError::WorkerExited`] if the worker dies while starting
    /// - [`WorkerError::StartupTimeout`] if it is not ready within the ceiling
    ///
    /// On error the state is [`WorkerState::FailedToStart`] and no process is left behind.
    pub async fn start(&mut self) -> WorkerResult<u16> {
        if self.state == WorkerState::Running && self.is_running() {
            if let Some(process) = &self.process {
                return Ok(process.port);
            }
        }

        // A crashed worker may still be waiting to be reaped.
        if self.process.is_some() {
            debug!("clearing dead worker before start");
            self.stop().await;
        }

        match self.launch().await {
            Ok(port) => {
                self.state = WorkerState::Running;
                info!(port, artifact = %self.artifact.display(), "worker running");
                Ok(port)
            }
            Err(e) => {
                let tail = self
                    .process
                    .as_ref()
                    .map(|p| p.drain.tail(FAILURE_TAIL_BYTES))
                    .unwrap_or_default();
                error!(error = %e, output = %tail, "worker failed to start");
                self.terminate().await;
                self.state = WorkerState::FailedToStart;
                Err(e)
            }
        }
    }

    async fn launch(&mut self) -> WorkerResult<u16> {
        let port = self.ports.acquire(self.settings.preferred_port)?;
        let command = LaunchCommand::new(&self.settings, &self.artifact, port)?;
        debug!(program = %command.program, args = ?command.args, "starting worker");

        let mut child = command.to_command().spawn().map_err(WorkerError::SpawnFailed)?;
        let drain = OutputDrain::attach(child.stdout.take(), child.stderr.take());

        self.process = Some(WorkerProcess {
            child,
            port,
            started_at: Instant::now(),
            drain,
        });
        self.state = WorkerState::Starting;

        self.wait_until_ready(port).await?;
        Ok(port)
    }

    /// Poll the readiness endpoint at a fixed interval until it answers 2xx.
    async fn wait_until_ready(&mut self, port: u16) -> WorkerResult<()> {
        let url = format!("{}{}", base_url(&self.settings.host, port), VERSION_PATH);
        let ceiling = self.settings.startup_timeout();
        let deadline = Instant::now() + ceiling;
        let interval = self.settings.ready_poll_interval();

        loop {
            if let Some(status) = self.exit_status() {
                return Err(WorkerError::WorkerExited { status });
            }

            match self
                .probe
                .get(&url)
                .timeout(self.settings.probe_timeout())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    // Another process may hold the port the worker failed to bind.
                    if let Some(status) = self.exit_status() {
                        return Err(WorkerError::WorkerExited { status });
                    }
                    debug!(port, "readiness probe succeeded");
                    return Ok(());
                }
                Ok(response) => trace!(port, status = %response.status(), "worker not ready"),
                Err(e) => trace!(port, error = %e, "worker not ready"),
            }

            if Instant::now() >= deadline {
                return Err(WorkerError::StartupTimeout(ceiling));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Exit status of the worker if it has exited.
    fn exit_status(&mut self) -> Option<String> {
        let process = self.process.as_mut()?;
        match process.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(format!("unknown ({})", e)),
        }
    }

    /// Kill the worker and stop draining its output.
    ///
    /// No graceful shutdown handshake is attempted. Calling this without a
    /// worker is a no-op.
    pub async fn stop(&mut self) {
        if self.process.is_none() {
            return;
        }
        debug!("stopping worker");
        self.terminate().await;
        self.state = WorkerState::Stopped;
    }

    async fn terminate(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };

        if let Err(e) = process.child.start_kill() {
            // Already exited
            trace!(error = %e, "kill failed");
        }
        match tokio::time::timeout(self.settings.stop_timeout(), process.child.wait()).await {
            Ok(Ok(status)) => debug!(port = process.port, %status, "worker exited"),
            Ok(Err(e)) => warn!(port = process.port, error = %e, "failed to reap worker"),
            Err(_) => warn!(port = process.port, "worker did not exit after kill"),
        }
        process.drain.stop().await;
    }

    /// Replace the worker with a fresh one.
    pub async fn restart(&mut self) -> WorkerResult<u16> {
        self.restarts += 1;
        info!(restarts = self.restarts, "restarting worker");
        self.stop().await;
        self.start().await
    }

    /// Whether the OS reports the worker process alive.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Port of the current worker.
    pub fn port(&self) -> Option<u16> {
        self.process.as_ref().map(|p| p.port)
    }

    /// Base URL of the current worker.
    pub fn base_url(&self) -> Option<String> {
        self.port().map(|port| base_url(&self.settings.host, port))
    }

    /// Time since the current worker was spawned.
    pub fn uptime(&self) -> Option<Duration> {
        self.process.as_ref().map(|p| p.started_at.elapsed())
    }

    /// Everything the current worker has written to stdout and stderr.
    pub fn output(&self) -> Option<Vec<u8>> {
        self.process.as_ref().map(|p| p.drain.output())
    }

    /// Number of restarts performed so far.
    pub fn restart_count(&self) -> u64 {
        self.restarts
    }
}
