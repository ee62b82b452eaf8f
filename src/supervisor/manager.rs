//! Supervisor
//!
//! Owns the vcontrold process: start, stop, crash recovery and health.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, VitoError};
use super::health::probe;
use super::platform::{BinaryResolver, Platform};
use super::process::{ExitInfo, LaunchSpec, ManagedProcess, OsLauncher, ProcessLauncher};

/// Lifecycle states of the supervised daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// Exited during the startup grace period
    Failed,
}

/// Read-only observability snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub running: bool,
    pub pid: Option<u32>,
    pub binary: PathBuf,
    pub binary_exists: bool,
    pub log_file: PathBuf,
    pub device: String,
    pub host: String,
    pub port: u16,
    pub uptime_secs: Option<f64>,
    pub start_time_unix_ms: Option<u64>,
    pub health_checks: u64,
    pub last_health_check_unix_ms: Option<u64>,
    pub last_exit_code: Option<i32>,
}

/// Daemon binary details
#[derive(Debug, Clone, Serialize)]
pub struct BinaryInfo {
    pub path: PathBuf,
    pub exists: bool,
    /// First line of `--version`, when the binary answers in time
    pub version: Option<String>,
}

/// Mutable lifecycle data, guarded as one unit
struct Lifecycle {
    state: SupervisorState,
    process: Option<Box<dyn ManagedProcess>>,
    binary: PathBuf,
    started_at: Option<(Instant, SystemTime)>,
    last_exit: Option<ExitInfo>,
}

/// Supervises one vcontrold process
///
/// ## Concurrency Model
///
/// - **Lifecycle** (start/stop/ensure_running/is_running): serialized by the
///   `lifecycle` mutex. `start` holds it through the grace period.
/// - **Health checks**: lock-free counters, run concurrently with anything.
pub struct Supervisor {
    config: Config,
    platform: Platform,
    launcher: Box<dyn ProcessLauncher>,
    resolver: Option<Box<dyn BinaryResolver>>,
    lifecycle: Mutex<Lifecycle>,
    health_checks: AtomicU64,
    last_health_check_ms: AtomicU64,
}

impl Supervisor {
    /// Supervisor launching real processes
    pub fn new(config: Config) -> Self {
        Self::with_launcher(config, Box::new(OsLauncher))
    }

    /// Supervisor with a custom process launcher
    pub fn with_launcher(config: Config, launcher: Box<dyn ProcessLauncher>) -> Self {
        let platform = Platform::current();
        let binary = config.binary_path();
        Self {
            config,
            platform,
            launcher,
            resolver: None,
            lifecycle: Mutex::new(Lifecycle {
                state: SupervisorState::Stopped,
                process: None,
                binary,
                started_at: None,
                last_exit: None,
            }),
            health_checks: AtomicU64::new(0),
            last_health_check_ms: AtomicU64::new(0),
        }
    }

    /// Fetch a missing binary through `resolver` before starting
    pub fn with_resolver(mut self, resolver: Box<dyn BinaryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Launch the daemon
    ///
    /// Blocks for the grace period. A no-op when already running.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.start_locked(&mut lifecycle)
    }

    fn start_locked(&self, lc: &mut Lifecycle) -> Result<()> {
        if self.poll_locked(lc) {
            tracing::warn!("vcontrold already running");
            return Ok(());
        }

        self.ensure_dirs()?;
        self.prepare_binary(lc)?;

        let spec = LaunchSpec {
            program: lc.binary.clone(),
            args: self.args(),
            working_dir: self.config.base_dir.clone(),
            log_file: self.config.log_file(),
        };

        tracing::info!(
            "Starting vcontrold on {} (device: {})",
            self.config.daemon_addr(),
            self.config.device
        );
        tracing::debug!("Command: {} {}", spec.program.display(), spec.args.join(" "));

        lc.state = SupervisorState::Starting;
        let mut process = match self.launcher.launch(&spec) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!("Failed to launch vcontrold: {}", e);
                lc.state = SupervisorState::Stopped;
                return Err(e);
            }
        };

        // A half-started daemon cannot be probed yet
        sleep(self.config.grace_period);

        match process.try_exit() {
            Ok(None) => {
                tracing::info!("vcontrold started (PID: {})", process.id());
                lc.state = SupervisorState::Running;
                lc.started_at = Some((Instant::now(), SystemTime::now()));
                lc.last_exit = None;
                lc.process = Some(process);
                Ok(())
            }
            Ok(Some(exit)) => {
                tracing::error!("vcontrold exited during startup (exit code: {:?})", exit.code);
                lc.state = SupervisorState::Failed;
                lc.last_exit = Some(exit);
                Err(VitoError::ProcessExitedEarly { code: exit.code })
            }
            Err(e) => {
                tracing::error!("Cannot query vcontrold after launch: {}", e);
                let _ = process.kill();
                let _ = process.wait();
                lc.state = SupervisorState::Failed;
                Err(e)
            }
        }
    }

    /// Stop the daemon: graceful signal, bounded wait, then kill
    ///
    /// Always ends in `Stopped`; signal failures are logged.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
        Ok(())
    }

    fn stop_locked(&self, lc: &mut Lifecycle) {
        let Some(mut process) = lc.process.take() else {
            return;
        };

        let pid = process.id();
        tracing::info!("Stopping vcontrold (PID: {})", pid);
        lc.state = SupervisorState::Stopping;

        if let Err(e) = process.terminate() {
            tracing::warn!("{}", e);
        }

        let exit = match process.wait_timeout(self.config.stop_timeout) {
            Ok(Some(exit)) => Some(exit),
            Ok(None) => {
                tracing::warn!("vcontrold not responding, killing PID {}", pid);
                Self::force_kill(process.as_mut())
            }
            Err(e) => {
                tracing::warn!("Waiting for PID {} failed: {}", pid, e);
                Self::force_kill(process.as_mut())
            }
        };

        lc.state = SupervisorState::Stopped;
        lc.started_at = None;
        lc.last_exit = exit;
        tracing::info!("vcontrold stopped");
    }

    fn force_kill(process: &mut dyn ManagedProcess) -> Option<ExitInfo> {
        if let Err(e) = process.kill() {
            tracing::warn!("{}", e);
        }
        match process.wait() {
            Ok(exit) => Some(exit),
            Err(e) => {
                tracing::warn!("Reaping PID {} failed: {}", process.id(), e);
                None
            }
        }
    }

    /// Stop, then start again
    pub fn restart(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
        self.start_locked(&mut lifecycle)
    }

    /// Whether the OS process is alive
    pub fn is_running(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        self.poll_locked(&mut lifecycle)
    }

    /// Poll the process; clears the handle when it has exited or cannot be queried
    fn poll_locked(&self, lc: &mut Lifecycle) -> bool {
        let Some(process) = lc.process.as_mut() else {
            return false;
        };

        match process.try_exit() {
            Ok(None) => true,
            Ok(Some(exit)) => {
                tracing::warn!(
                    "vcontrold (PID: {}) exited unexpectedly (exit code: {:?})",
                    process.id(),
                    exit.code
                );
                lc.process = None;
                lc.state = SupervisorState::Stopped;
                lc.started_at = None;
                lc.last_exit = Some(exit);
                false
            }
            Err(e) => {
                // An unqueryable daemon may still hold the port; tear it down
                // so a relaunch never runs next to it
                tracing::warn!("Cannot query vcontrold (PID: {}): {}", process.id(), e);
                self.stop_locked(lc);
                false
            }
        }
    }

    /// TCP reachability of the daemon
    ///
    /// Independent of the process handle: catches a daemon that is alive
    /// but not serving.
    pub fn health_check(&self) -> bool {
        let reachable = probe(&self.config.host, self.config.port, self.config.health_check_timeout);

        self.health_checks.fetch_add(1, Ordering::Relaxed);
        self.last_health_check_ms.store(unix_millis(SystemTime::now()), Ordering::Relaxed);

        if reachable {
            tracing::debug!("Health check OK ({})", self.config.daemon_addr());
        } else {
            tracing::warn!("Health check FAILED ({})", self.config.daemon_addr());
        }
        reachable
    }

    /// Make sure the daemon is usable
    ///
    /// Alive process: result of a health check. Otherwise: a fresh start.
    pub fn ensure_running(&self) -> Result<bool> {
        let mut lifecycle = self.lifecycle.lock();
        if self.poll_locked(&mut lifecycle) {
            drop(lifecycle);
            return Ok(self.health_check());
        }

        tracing::warn!("vcontrold not running, restarting");
        self.start_locked(&mut lifecycle)?;
        Ok(true)
    }

    // =========================================================================
    // Startup helpers
    // =========================================================================

    fn ensure_dirs(&self) -> Result<()> {
        let log_file = self.config.log_file();
        let dirs = [Some(self.config.base_dir.as_path()), log_file.parent()];

        for dir in dirs.into_iter().flatten() {
            fs::create_dir_all(dir).map_err(|source| {
                tracing::error!("Cannot create {}: {}", dir.display(), source);
                VitoError::Directory {
                    path: dir.to_path_buf(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Locate the binary, fetching it through the resolver when missing
    fn prepare_binary(&self, lc: &mut Lifecycle) -> Result<()> {
        if !lc.binary.is_file() {
            tracing::warn!("vcontrold binary not found: {}", lc.binary.display());

            let resolver = self
                .resolver
                .as_ref()
                .ok_or_else(|| VitoError::BinaryMissing(lc.binary.clone()))?;

            let resolved = resolver
                .resolve(self.platform, &self.config.base_dir)
                .map_err(|e| {
                    tracing::error!("Cannot fetch vcontrold for {}: {}", self.platform, e);
                    VitoError::BinaryMissing(lc.binary.clone())
                })?;

            if !resolved.is_file() {
                return Err(VitoError::BinaryMissing(resolved));
            }
            tracing::info!("vcontrold binary installed: {}", resolved.display());
            lc.binary = resolved;
        }

        if let Err(e) = make_executable(&lc.binary) {
            tracing::warn!("Cannot mark {} executable: {}", lc.binary.display(), e);
        }
        Ok(())
    }

    /// Daemon arguments: `-l <host> -p <port> -d <device> --loglevel <LEVEL>`
    pub fn args(&self) -> Vec<String> {
        vec![
            "-l".to_string(),
            self.config.host.clone(),
            "-p".to_string(),
            self.config.port.to_string(),
            "-d".to_string(),
            self.config.device.clone(),
            "--loglevel".to_string(),
            self.config.log_level.to_string(),
        ]
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SupervisorState {
        self.lifecycle.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.lifecycle.lock().process.as_ref().map(|p| p.id())
    }

    pub fn binary_path(&self) -> PathBuf {
        self.lifecycle.lock().binary.clone()
    }

    pub fn log_file(&self) -> PathBuf {
        self.config.log_file()
    }

    pub fn health_check_count(&self) -> u64 {
        self.health_checks.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot for observability
    pub fn status(&self) -> SupervisorStatus {
        let mut lifecycle = self.lifecycle.lock();
        let running = self.poll_locked(&mut lifecycle);
        let last_check = self.last_health_check_ms.load(Ordering::Relaxed);

        SupervisorStatus {
            state: lifecycle.state,
            running,
            pid: lifecycle.process.as_ref().map(|p| p.id()),
            binary: lifecycle.binary.clone(),
            binary_exists: lifecycle.binary.is_file(),
            log_file: self.config.log_file(),
            device: self.config.device.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            uptime_secs: lifecycle.started_at.map(|(at, _)| at.elapsed().as_secs_f64()),
            start_time_unix_ms: lifecycle.started_at.map(|(_, wall)| unix_millis(wall)),
            health_checks: self.health_checks.load(Ordering::Relaxed),
            last_health_check_unix_ms: (last_check > 0).then_some(last_check),
            last_exit_code: lifecycle.last_exit.and_then(|exit| exit.code),
        }
    }

    /// Existence and version of the daemon binary
    pub fn binary_info(&self) -> BinaryInfo {
        let path = self.binary_path();
        let exists = path.is_file();
        let version = if exists {
            query_version(&path, self.config.health_check_timeout)
        } else {
            None
        };
        BinaryInfo { path, exists, version }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let mut lifecycle = self.lifecycle.lock();
        self.stop_locked(&mut lifecycle);
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    if mode & 0o111 != 0o111 {
        permissions.set_mode(mode | 0o111);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Run `<binary> --version`, bounded by `timeout`
fn query_version(binary: &Path, timeout: Duration) -> Option<String> {
    let mut child = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() < deadline => sleep(Duration::from_millis(50)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    };

    if !status.success() {
        return None;
    }

    let mut output = String::new();
    child.stdout.take()?.read_to_string(&mut output).ok()?;
    output.lines().next().map(|line| line.trim().to_string())
}
