//! Coordination store process control

use crate::common::{Error, Result};
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Check if a process with the given PID is still alive.
///
/// Zombies count as dead: they no longer serve anything.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    // kill(pid, 0) performs the permission and existence checks only
    let ret = unsafe { libc::kill(raw, 0) };
    let exists = ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);

    exists && !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // /proc/<pid>/stat: "<pid> (<comm>) <state> ..."; comm may contain spaces
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            let after_comm = &stat[stat.rfind(')')? + 1..];
            after_comm.trim_start().chars().next()
        })
        .is_some_and(|state| state == 'Z')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Send `signal` to `pid`. `Ok(false)` when the process no longer exists.
pub fn send_signal(pid: u32, signal: libc::c_int) -> Result<bool> {
    let raw = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| Error::ProcessControl(format!("invalid pid {}", pid)))?;

    if unsafe { libc::kill(raw, signal) } == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(false);
    }
    Err(Error::ProcessControl(format!(
        "failed to send signal {} to pid {}: {}",
        signal, pid, err
    )))
}

/// A running coordination store, launched by us or found from its pid file
#[derive(Debug)]
pub struct StoreProcess {
    pid: u32,
    /// Present when this daemon launched the process and must reap it
    child: Option<Child>,
}

impl StoreProcess {
    /// Launch `executable` in its own process group so that signals aimed at
    /// the daemon (Ctrl-C included) do not reach the store.
    pub fn spawn(
        executable: &Path,
        args: &[String],
        env: &[(String, String)],
        log_file: Option<&Path>,
    ) -> Result<Self> {
        let mut cmd = std::process::Command::new(executable);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .process_group(0);

        match log_file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let log = OpenOptions::new().create(true).append(true).open(path)?;
                let log_err = log.try_clone()?;
                cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut cmd = tokio::process::Command::from(cmd);
        cmd.kill_on_drop(false);

        let child = cmd.spawn().map_err(|e| {
            Error::ProcessControl(format!("failed to launch {}: {}", executable.display(), e))
        })?;
        let pid = child.id().ok_or_else(|| {
            Error::ProcessControl(format!("{} exited before reporting a pid", executable.display()))
        })?;

        info!(executable = %executable.display(), pid, "Coordination store launched");
        Ok(Self {
            pid,
            child: Some(child),
        })
    }

    /// Handle on a process started by an earlier daemon
    pub fn adopt(pid: u32) -> Self {
        Self { pid, child: None }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether this daemon launched the process
    pub fn is_child(&self) -> bool {
        self.child.is_some()
    }

    pub fn is_alive(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => is_process_alive(self.pid),
        }
    }

    /// SIGTERM, wait up to `grace` for the exit, then SIGKILL and wait again.
    ///
    /// Returns once the process is gone (and reaped, for our own children).
    pub async fn terminate(&mut self, grace: Duration) -> Result<()> {
        if !send_signal(self.pid, libc::SIGTERM)? {
            debug!(pid = self.pid, "Process already gone");
            return self.reap_exited().await;
        }
        if self.wait_exit(grace).await? {
            return Ok(());
        }

        warn!(pid = self.pid, grace_ms = grace.as_millis() as u64, "Process ignored SIGTERM, killing");
        if send_signal(self.pid, libc::SIGKILL)? && !self.wait_exit(grace).await? {
            return Err(Error::ProcessControl(format!(
                "pid {} still running after SIGKILL",
                self.pid
            )));
        }
        self.reap_exited().await
    }

    /// Wait for the exit for at most `limit`. `Ok(true)` once it exited.
    async fn wait_exit(&mut self, limit: Duration) -> Result<bool> {
        let pid = self.pid;
        match &mut self.child {
            Some(child) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(pid, %status, "Process reaped");
                    Ok(true)
                }
                Ok(Err(e)) => Err(Error::ProcessControl(format!(
                    "failed to reap pid {}: {}",
                    pid, e
                ))),
                Err(_) => Ok(false),
            },
            None => {
                let deadline = Instant::now() + limit;
                loop {
                    if !is_process_alive(pid) {
                        return Ok(true);
                    }
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn reap_exited(&mut self) -> Result<()> {
        let pid = self.pid;
        if let Some(child) = &mut self.child {
            child
                .wait()
                .await
                .map_err(|e| Error::ProcessControl(format!("failed to reap pid {}: {}", pid, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_of_self_and_nonsense() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(0));
        assert!(!is_process_alive(u32::MAX));
    }

    #[test]
    fn test_signal_rejects_invalid_pid() {
        assert!(matches!(
            send_signal(0, libc::SIGTERM),
            Err(Error::ProcessControl(_))
        ));
    }

    #[tokio::test]
    async fn test_spawn_and_terminate() {
        let mut process = StoreProcess::spawn(
            Path::new("sleep"),
            &["30".to_string()],
            &[],
            None,
        )
        .unwrap();
        let pid = process.pid();
        assert!(process.is_child());
        assert!(process.is_alive());
        assert!(is_process_alive(pid));

        process.terminate(Duration::from_secs(5)).await.unwrap();
        assert!(!is_process_alive(pid));
    }

    #[tokio::test]
    async fn test_terminate_adopted_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let mut adopted = StoreProcess::adopt(child.id());
        assert!(!adopted.is_child());
        assert!(adopted.is_alive());

        // reap from the owning side while the adopted handle polls
        let reaper = std::thread::spawn(move || child.wait());
        adopted.terminate(Duration::from_secs(5)).await.unwrap();
        reaper.join().unwrap().unwrap();
        assert!(!adopted.is_alive());
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = StoreProcess::spawn(Path::new("/nonexistent/etcd"), &[], &[], None).unwrap_err();
        assert!(matches!(err, Error::ProcessControl(_)));
    }
}
