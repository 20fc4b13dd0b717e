//! Owned emulator process
//!
//! Spawns the emulator binary in its own process group and terminates the
//! whole group on teardown: SIGTERM first, SIGKILL after the grace period.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use async_trait::async_trait;

use crate::config::{EmulatorConfig, EMULATOR_BINARY};
use crate::error::{EmulatorError, EmulatorResult, TeardownWarning};
use crate::services::diagnostics::{self, Diagnostics};
use crate::traits::{EmulatorProcess, ProcessLauncher};
use shared::{component_debug, component_warn, ComponentId};

/// How long output readers may take to hit end of stream after an exit
const DRAIN_LIMIT: Duration = Duration::from_millis(250);

/// Locate the emulator binary.
///
/// An explicit path is used as is; a bare name (or the default `gcloud`)
/// is looked up on `PATH`.
pub fn resolve_binary(config: &EmulatorConfig) -> EmulatorResult<PathBuf> {
    let requested = config
        .binary
        .clone()
        .unwrap_or_else(|| PathBuf::from(EMULATOR_BINARY));

    if requested.components().count() > 1 || requested.is_absolute() {
        return Ok(requested);
    }

    which::which(&requested)
        .map_err(|_| EmulatorError::startup(format!("binary not found on PATH: {}", requested.display())))
}

/// A spawned emulator, exclusively owned by the controller
pub struct OwnedProcess {
    child: Child,
    pid: u32,
    diagnostics: Diagnostics,
    readers: Vec<JoinHandle<()>>,
}

impl OwnedProcess {
    /// Spawn the emulator described by `config` with its output captured
    pub fn spawn(config: &EmulatorConfig) -> EmulatorResult<Self> {
        let binary = resolve_binary(config)?;
        let args = config.to_args();

        let mut cmd = Command::new(&binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| spawn_error(&binary, e))?;
        let pid = child
            .id()
            .ok_or_else(|| EmulatorError::startup("emulator exited before its pid could be read"))?;

        let diagnostics = Diagnostics::new();
        let readers = diagnostics::spawn_output_consumers(&mut child, &diagnostics);

        component_debug!(
            ComponentId::Controller,
            "🏭 Spawned emulator (PID: {}): {} {}",
            pid,
            binary.display(),
            args.join(" ")
        );

        Ok(Self {
            child,
            pid,
            diagnostics,
            readers,
        })
    }

    #[cfg(unix)]
    fn signal_terminate(&mut self) {
        signal_group(self.pid, nix::sys::signal::Signal::SIGTERM);
    }

    #[cfg(not(unix))]
    fn signal_terminate(&mut self) {
        let _ = self.child.start_kill();
    }

    /// SIGKILL anything left in the process group (e.g. a JVM started by the wrapper)
    #[cfg(unix)]
    fn kill_group_remnants(&mut self) {
        signal_group(self.pid, nix::sys::signal::Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    fn kill_group_remnants(&mut self) {}
}

#[async_trait]
impl EmulatorProcess for OwnedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status if the process has already exited
    fn try_exit_status(&mut self) -> EmulatorResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Captured output, after giving the readers a moment to flush
    async fn collect_diagnostics(&mut self) -> Vec<String> {
        diagnostics::drain(&mut self.readers, DRAIN_LIMIT).await;
        self.diagnostics.snapshot()
    }

    /// Terminate the process group, waiting `grace` after each signal.
    ///
    /// Returns a warning when the process is still alive after SIGKILL.
    async fn terminate(&mut self, grace: Duration) -> Option<TeardownWarning> {
        if let Ok(Some(status)) = self.child.try_wait() {
            component_debug!(ComponentId::Controller, "Emulator {} already exited: {}", self.pid, status);
            self.kill_group_remnants();
            return None;
        }

        component_debug!(ComponentId::Controller, "📤 Sending SIGTERM to emulator {}", self.pid);
        self.signal_terminate();

        if wait_for_exit(&mut self.child, grace).await {
            component_debug!(ComponentId::Controller, "✅ Emulator {} terminated gracefully", self.pid);
            self.kill_group_remnants();
            return None;
        }

        component_warn!(
            ComponentId::Controller,
            "🔨 Emulator {} didn't respond to SIGTERM within {:?}, using SIGKILL",
            self.pid,
            grace
        );
        self.kill_group_remnants();
        let _ = self.child.start_kill();

        if wait_for_exit(&mut self.child, grace).await {
            component_debug!(ComponentId::Controller, "🔨 Emulator {} force killed", self.pid);
            return None;
        }

        Some(TeardownWarning {
            pid: self.pid,
            message: format!("still running {:?} after SIGKILL", grace),
        })
    }
}

/// Launches the real emulator binary
#[derive(Clone, Debug, Default)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn spawn(&self, config: &EmulatorConfig) -> EmulatorResult<Box<dyn EmulatorProcess>> {
        Ok(Box::new(OwnedProcess::spawn(config)?))
    }
}

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            component_warn!(ComponentId::Controller, "🚨 Emergency cleanup: force killing emulator {}", self.pid);
            self.kill_group_remnants();
            let _ = self.child.start_kill();
        }
    }
}

impl std::fmt::Debug for OwnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedProcess").field("pid", &self.pid).finish()
    }
}

async fn wait_for_exit(child: &mut Child, limit: Duration) -> bool {
    matches!(tokio::time::timeout(limit, child.wait()).await, Ok(Ok(_)))
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            component_warn!(ComponentId::Controller, "⚠️ Failed to send {} to emulator group {}: {}", signal, pid, e);
        }
    }
}

fn spawn_error(binary: &Path, error: std::io::Error) -> EmulatorError {
    let reason = match error.kind() {
        std::io::ErrorKind::NotFound => format!("binary not found: {}", binary.display()),
        std::io::ErrorKind::PermissionDenied => format!("permission denied executing {}", binary.display()),
        _ => format!("failed to spawn {}: {}", binary.display(), error),
    };
    EmulatorError::startup(reason)
}
