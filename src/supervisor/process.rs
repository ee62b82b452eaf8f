//! Process control
//!
//! The supervisor only talks to its daemon through [`ManagedProcess`], so
//! signal and process-group differences stay in the OS adapter.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::error::{Result, VitoError};

/// Polling step while waiting for an exit
const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Everything needed to launch the daemon
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// stdout and stderr are appended here
    pub log_file: PathBuf,
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// None when terminated by a signal
    pub code: Option<i32>,
}

/// Starts processes
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>>;
}

/// A running (or exited, not yet reaped) child process
pub trait ManagedProcess: Send {
    fn id(&self) -> u32;

    /// Exit status if the process has exited; never blocks
    fn try_exit(&mut self) -> Result<Option<ExitInfo>>;

    /// Ask the process to shut down
    fn terminate(&mut self) -> Result<()>;

    /// Kill the process without giving it a chance to clean up
    fn kill(&mut self) -> Result<()>;

    /// Block until the process exits
    fn wait(&mut self) -> Result<ExitInfo>;

    /// Wait up to `timeout` for the process to exit
    fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<ExitInfo>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(exit) = self.try_exit()? {
                return Ok(Some(exit));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(WAIT_INTERVAL.min(deadline - now));
        }
    }
}

// =============================================================================
// OS adapter
// =============================================================================

/// Launches real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

impl ProcessLauncher for OsLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        let log_output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_file)?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_output.try_clone()?))
            .stderr(Stdio::from(log_output));

        // Own process group, so terminal signals to us don't reach the daemon
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => VitoError::BinaryMissing(spec.program.clone()),
            _ => VitoError::Process(format!("Failed to spawn {}: {}", spec.program.display(), e)),
        })?;

        tracing::debug!("Spawned {} with PID {}", spec.program.display(), child.id());
        Ok(Box::new(OsProcess { child }))
    }
}

/// A child process started by [`OsLauncher`]
pub struct OsProcess {
    child: Child,
}

impl OsProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl ManagedProcess for OsProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>> {
        Ok(self.child.try_wait()?.map(|status| ExitInfo { code: status.code() }))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.child.id();
        tracing::debug!("Sending SIGTERM to process {}", pid);
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // Already gone
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(VitoError::Process(format!("SIGTERM to {} failed: {}", pid, e))),
        }
    }

    // No graceful signal for detached processes on this platform
    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(VitoError::Process(format!("kill of {} failed: {}", self.child.id(), e))),
        }
    }

    fn wait(&mut self) -> Result<ExitInfo> {
        let status = self.child.wait()?;
        Ok(ExitInfo { code: status.code() })
    }
}
