//! Coordination store supervisor

use crate::common::{Error, Result};
use crate::supervisor::args::{LaunchUrls, StoreArgs};
use crate::supervisor::files::{EnvFile, PidFile};
use crate::supervisor::health::{HealthProbe, ProbeResult};
use crate::supervisor::process::{is_process_alive, StoreProcess};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Budget of the single probe deciding whether a recorded instance is usable
const DETECTION_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything the supervisor needs, resolved from configuration once
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub executable: PathBuf,
    pub pid_file: PathBuf,
    pub env_file: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub health_timeout: Duration,
    pub health_interval: Duration,
    pub stop_timeout: Duration,
    pub urls: LaunchUrls,
}

/// Lifecycle stage of the local coordination store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotRunning,
    Starting,
    HealthCheckPending,
    Running,
    Stopping,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::NotRunning => write!(f, "not-running"),
            SupervisorState::Starting => write!(f, "starting"),
            SupervisorState::HealthCheckPending => write!(f, "health-check-pending"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Identity of the running store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub client_url: String,
    pub peer_url: String,
}

/// Owns the local coordination store process.
///
/// One supervisor per node. Operations take `&mut self`: whoever owns the
/// supervisor (the daemon bootstrap) serializes start, stop and restart.
pub struct Supervisor {
    options: SupervisorOptions,
    pid_file: PidFile,
    env_file: EnvFile,
    state: SupervisorState,
    process: Option<StoreProcess>,
    args: Option<StoreArgs>,
    env: Vec<(String, String)>,
}

impl Supervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            pid_file: PidFile::new(&options.pid_file),
            env_file: EnvFile::new(&options.env_file),
            options,
            state: SupervisorState::NotRunning,
            process: None,
            args: None,
            env: Vec::new(),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Arguments of the last successful start
    pub fn cached_args(&self) -> Option<&StoreArgs> {
        self.args.as_ref()
    }

    /// Environment passed to launched processes
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn identity(&self) -> Option<ProcessIdentity> {
        let process = self.process.as_ref()?;
        let args = self.args.as_ref()?;
        Some(ProcessIdentity {
            pid: process.pid(),
            client_url: args.urls.advertise_client.clone(),
            peer_url: args.urls.initial_advertise_peer.clone(),
        })
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Coordination store state change");
            self.state = next;
        }
    }

    /// Start the store for this node.
    ///
    /// With a recorded environment the node already belongs to a cluster:
    /// relaunch with that environment and no bootstrap flag. Without one this
    /// is the first node and it bootstraps a single-member cluster.
    pub async fn start_initial(&mut self) -> Result<ProcessIdentity> {
        let urls = self.options.urls.clone();
        let data_dir = self.options.data_dir.clone();

        match self.env_file.read()? {
            Some(vars) => {
                info!(
                    path = %self.env_file.path().display(),
                    count = vars.len(),
                    "Restoring coordination store environment"
                );
                self.env = vars;
                self.start(StoreArgs::rejoin(urls, data_dir)).await
            }
            None => {
                info!("Starting coordination store for an initial node");
                self.env.clear();
                self.start(StoreArgs::bootstrap(urls, data_dir)).await
            }
        }
    }

    /// Record the environment a later `start_initial` relaunches with.
    pub fn persist_environment(&mut self, vars: Vec<(String, String)>) -> Result<()> {
        self.env_file.write(&vars)?;
        info!(
            path = %self.env_file.path().display(),
            count = vars.len(),
            "Coordination store environment saved"
        );
        self.env = vars;
        Ok(())
    }

    /// Ensure a healthy store runs with `args`.
    ///
    /// A live, healthy instance named by the pid file is adopted as is.
    /// Otherwise a new process is launched and must pass the health check
    /// within the configured timeout.
    pub async fn start(&mut self, args: StoreArgs) -> Result<ProcessIdentity> {
        self.transition(SupervisorState::Starting);

        match self.launch_or_adopt(args).await {
            Ok(identity) => {
                self.transition(SupervisorState::Running);
                Ok(identity)
            }
            Err(e) => {
                let alive = self.process.as_mut().is_some_and(|p| p.is_alive());
                self.transition(if alive {
                    SupervisorState::Running
                } else {
                    SupervisorState::NotRunning
                });
                Err(e)
            }
        }
    }

    async fn launch_or_adopt(&mut self, args: StoreArgs) -> Result<ProcessIdentity> {
        let probe = HealthProbe::new(args.client_url())?;

        if let Some(pid) = self.running_instance(&probe).await? {
            info!(pid, "Coordination store instance is already running");
            let owned = self.process.as_ref().map(StoreProcess::pid) == Some(pid);
            if !owned {
                if let Some(previous) = self.process.replace(StoreProcess::adopt(pid)) {
                    warn!(
                        previous = previous.pid(),
                        pid, "Pid file names another process, following the pid file"
                    );
                }
            }
            self.args = Some(args);
            return self.identity().ok_or_else(|| Error::Internal("no process identity".into()));
        }

        // A process we hold but that failed detection must not outlive its replacement
        if let Some(mut stale) = self.process.take() {
            warn!(pid = stale.pid(), "Stopping unusable coordination store instance");
            if let Err(e) = stale.terminate(self.options.stop_timeout).await {
                self.process = Some(stale);
                return Err(e);
            }
        }

        let argv = args.to_args();
        info!(
            executable = %self.options.executable.display(),
            args = ?argv,
            bootstrap = args.is_bootstrap(),
            "Starting coordination store"
        );
        let mut process = StoreProcess::spawn(
            &self.options.executable,
            &argv,
            &self.env,
            self.options.log_file.as_deref(),
        )?;
        let pid = process.pid();

        self.transition(SupervisorState::HealthCheckPending);
        if let Err(e) = probe
            .wait_healthy(self.options.health_timeout, self.options.health_interval)
            .await
        {
            error!(pid, error = %e, "Health of coordination store is not proper, check its configuration");
            self.discard(&mut process).await;
            return Err(e);
        }
        // A healthy answer may come from another instance holding the port
        if !process.is_alive() {
            error!(pid, "Coordination store exited during startup");
            self.discard(&mut process).await;
            return Err(Error::ProcessControl("store exited during startup".into()));
        }
        debug!(pid, "Coordination store started");

        if let Err(e) = self.pid_file.write(pid) {
            self.discard(&mut process).await;
            return Err(e);
        }

        self.process = Some(process);
        self.args = Some(args);
        self.identity().ok_or_else(|| Error::Internal("no process identity".into()))
    }

    /// Pid of a recorded instance that is alive and healthy
    async fn running_instance(&self, probe: &HealthProbe) -> Result<Option<u32>> {
        let Some(pid) = self.pid_file.read()? else {
            return Ok(None);
        };

        if !is_process_alive(pid) {
            debug!(pid, "Pid file names a process that is gone");
            return Ok(None);
        }

        match probe.check(DETECTION_PROBE_TIMEOUT).await {
            ProbeResult::Healthy => Ok(Some(pid)),
            result => {
                warn!(pid, ?result, "Coordination store health check failed, launching a new instance");
                Ok(None)
            }
        }
    }

    async fn discard(&self, process: &mut StoreProcess) {
        if let Err(e) = process.terminate(self.options.stop_timeout).await {
            error!(pid = process.pid(), error = %e, "Could not stop failed coordination store");
        }
    }

    /// Terminate the store and wait until it has exited.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Err(Error::ProcessControl(
                "no coordination store process to stop".into(),
            ));
        };
        let pid = process.pid();
        self.transition(SupervisorState::Stopping);

        if let Err(e) = process.terminate(self.options.stop_timeout).await {
            error!(pid, error = %e, "Could not stop coordination store");
            self.process = Some(process);
            self.transition(SupervisorState::Running);
            return Err(e);
        }

        // Leave a pid file that names someone else alone
        match self.pid_file.read() {
            Ok(Some(recorded)) if recorded == pid => {
                if let Err(e) = self.pid_file.remove() {
                    warn!(path = %self.pid_file.path().display(), error = %e, "Failed to remove pid file");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read pid file after stop"),
        }

        self.transition(SupervisorState::NotRunning);
        info!(pid, launched = process.is_child(), "Coordination store stopped");
        Ok(())
    }

    /// Stop, then start again with the cached arguments.
    ///
    /// The relaunch never carries the bootstrap declaration: the member
    /// already exists. A failed stop aborts the restart.
    pub async fn restart(&mut self) -> Result<ProcessIdentity> {
        let args = self
            .args
            .as_ref()
            .map(StoreArgs::without_bootstrap)
            .ok_or_else(|| {
                Error::ProcessControl("coordination store was never started".into())
            })?;

        self.stop().await.map_err(|e| {
            error!(error = %e, "Could not stop coordination store, not restarting");
            e
        })?;

        info!("Restarting coordination store");
        self.start(args).await
    }
}
