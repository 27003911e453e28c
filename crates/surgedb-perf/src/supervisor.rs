//! Lifecycle of the service under test.
//!
//! [`ServiceSupervisor::start`] spawns the configured shell command and hands
//! back a [`ServiceGuard`]. The guard must be shut down explicitly for a
//! graceful stop; dropping it kills the process instead.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time a terminated service gets to exit before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Service process errors
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The start command could not be spawned
    #[error("failed to start service `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Waiting on or signalling the process failed
    #[error("service process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Starts the service under test through the platform shell.
#[derive(Debug, Clone)]
pub struct ServiceSupervisor {
    command: String,
    grace_period: Duration,
    quiet: bool,
}

impl ServiceSupervisor {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            quiet: false,
        }
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Discard the service's stdout/stderr instead of inheriting them.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Spawn the start command. Readiness is not checked here.
    pub fn start(&self) -> Result<ServiceGuard, SupervisorError> {
        let mut cmd = shell_command(&self.command);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        // Own process group, so the whole tree (e.g. `cargo run` and its
        // server) can be signalled at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        info!(
            "Started service `{}` (pid {})",
            self.command,
            child.id().map_or_else(|| "?".to_string(), |p| p.to_string())
        );
        Ok(ServiceGuard {
            child,
            grace_period: self.grace_period,
        })
    }
}

/// Running service process.
///
/// Dropping a guard that was never shut down force-kills the process, so an
/// early return or a panic never leaks the service.
#[derive(Debug)]
pub struct ServiceGuard {
    child: Child,
    grace_period: Duration,
}

impl ServiceGuard {
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the process has already exited on its own.
    pub fn try_exited(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        Ok(self.child.try_wait()?)
    }

    /// Ask the service to terminate, wait out the grace period, then kill it.
    ///
    /// The child is reaped before the guard drops, so `Drop` finds it exited
    /// and sends nothing.
    pub async fn shutdown(mut self) -> Result<ExitStatus, SupervisorError> {
        let grace_period = self.grace_period;
        let child = &mut self.child;

        if let Some(status) = child.try_wait()? {
            debug!("Service had already exited: {}", status);
            return Ok(status);
        }

        request_terminate(child).await;
        match tokio::time::timeout(grace_period, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("Service stopped: {}", status);
                Ok(status)
            }
            Err(_) => {
                warn!(
                    "Service did not exit within {:?}, killing it",
                    grace_period
                );
                force_kill(child);
                Ok(child.wait().await?)
            }
        }
    }
}

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            warn!("Service guard dropped while running, killing it");
            force_kill(&mut self.child);
        }
    }
}

/// `sh -c <command>` (or `cmd /C` off unix).
#[cfg(unix)]
pub(crate) fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
pub(crate) fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// SIGTERM to the whole process group through `kill(1)`.
///
/// Without a usable `kill` binary only the shell itself is killed; anything
/// it started keeps running.
#[cfg(unix)]
async fn request_terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // Negative pid targets the process group created at spawn.
    let sent = Command::new("kill")
        .arg("-TERM")
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if !matches!(sent, Ok(status) if status.success()) {
        warn!("SIGTERM to process group {} failed, killing the shell only", pid);
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
async fn request_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// SIGKILL to the process group, then to the shell. Same `kill(1)` caveat as
/// [`request_terminate`].
fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let sent = std::process::Command::new("kill")
            .arg("-KILL")
            .arg("--")
            .arg(format!("-{pid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if !matches!(sent, Ok(status) if status.success()) {
            warn!("SIGKILL to process group {} failed, killing the shell only", pid);
        }
    }
    let _ = child.start_kill();
}
