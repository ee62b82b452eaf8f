//! Supervisor Tests
//!
//! The lifecycle state machine driven through a scripted process launcher.
//! Real processes are covered in process_tests.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vitolink::supervisor::{
    BinaryResolver, ExitInfo, LaunchSpec, ManagedProcess, Platform, ProcessLauncher,
    SupervisorState,
};
use vitolink::{Config, Result, Supervisor, VitoError};

// =============================================================================
// Helper Types
// =============================================================================

#[derive(Default)]
struct FakeState {
    launches: Vec<LaunchSpec>,
    /// Exit code reported right after launch (simulates a crash on startup)
    exit_on_launch: Option<i32>,
    /// Keep running after a terminate request
    ignore_terminate: bool,
    /// Fail the launch itself
    launch_error: bool,
    /// Status queries fail (until the next launch)
    query_error: bool,
    exited: Option<ExitInfo>,
    terminates: usize,
    kills: usize,
}

#[derive(Clone, Default)]
struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLauncher {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        let mut state = self.state();
        if state.launch_error {
            return Err(VitoError::Process("launch refused".to_string()));
        }
        state.launches.push(spec.clone());
        state.query_error = false;
        state.exited = state.exit_on_launch.map(|code| ExitInfo { code: Some(code) });
        Ok(Box::new(FakeProcess {
            pid: 1000 + state.launches.len() as u32,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
}

impl ManagedProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>> {
        let state = self.state.lock().unwrap();
        if state.query_error {
            return Err(VitoError::Process("status query failed".to_string()));
        }
        Ok(state.exited)
    }

    fn terminate(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminates += 1;
        if !state.ignore_terminate {
            state.exited = Some(ExitInfo { code: None });
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.kills += 1;
        state.exited = Some(ExitInfo { code: None });
        Ok(())
    }

    fn wait(&mut self) -> Result<ExitInfo> {
        self.state
            .lock()
            .unwrap()
            .exited
            .ok_or_else(|| VitoError::Process("would block forever".to_string()))
    }
}

/// Resolver that writes a placeholder binary
struct InstallingResolver;

impl BinaryResolver for InstallingResolver {
    fn resolve(&self, platform: Platform, install_dir: &Path) -> Result<PathBuf> {
        let path = install_dir.join(platform.binary_name());
        fs::write(&path, b"binary")?;
        Ok(path)
    }
}

struct FailingResolver;

impl BinaryResolver for FailingResolver {
    fn resolve(&self, _platform: Platform, _install_dir: &Path) -> Result<PathBuf> {
        Err(VitoError::Connection("release server unreachable".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(base_dir: &Path, port: u16) -> Config {
    Config::builder()
        .base_dir(base_dir)
        .host("127.0.0.1")
        .port(port)
        .grace_period(Duration::from_millis(10))
        .stop_timeout(Duration::from_millis(100))
        .health_check_timeout(Duration::from_millis(200))
        .build()
}

fn install_binary(base_dir: &Path) -> PathBuf {
    let path = base_dir.join(Platform::current().binary_name());
    fs::write(&path, b"binary").unwrap();
    path
}

/// Supervisor over a fake launcher with an installed binary
fn setup() -> (TempDir, FakeLauncher, Supervisor) {
    let temp_dir = TempDir::new().unwrap();
    install_binary(temp_dir.path());
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(
        config_for(temp_dir.path(), 3002),
        Box::new(launcher.clone()),
    );
    (temp_dir, launcher, supervisor)
}

// =============================================================================
// Start Tests
// =============================================================================

#[test]
fn test_start_launches_daemon() {
    let (temp, launcher, supervisor) = setup();

    supervisor.start().unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.is_running());
    assert_eq!(supervisor.pid(), Some(1001));

    let state = launcher.state();
    assert_eq!(state.launches.len(), 1);
    let spec = &state.launches[0];
    assert_eq!(spec.program, temp.path().join(Platform::current().binary_name()));
    assert_eq!(spec.working_dir, temp.path());
    assert_eq!(spec.log_file, temp.path().join("vcontrold.log"));
    assert_eq!(
        spec.args,
        vec!["-l", "127.0.0.1", "-p", "3002", "-d", "/dev/ttyUSB0", "--loglevel", "ERROR"]
    );
}

#[test]
fn test_start_when_running_is_noop() {
    let (_temp, launcher, supervisor) = setup();

    supervisor.start().unwrap();
    supervisor.start().unwrap();

    assert_eq!(launcher.state().launches.len(), 1);
}

#[test]
fn test_exit_during_grace_period() {
    let (_temp, launcher, supervisor) = setup();
    launcher.state().exit_on_launch = Some(3);

    let err = supervisor.start().unwrap_err();

    assert!(matches!(err, VitoError::ProcessExitedEarly { code: Some(3) }));
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.status().last_exit_code, Some(3));
}

#[test]
fn test_launch_error_returns_to_stopped() {
    let (_temp, launcher, supervisor) = setup();
    launcher.state().launch_error = true;

    assert!(matches!(supervisor.start(), Err(VitoError::Process(_))));
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[test]
fn test_creates_working_directory() {
    let temp = TempDir::new().unwrap();
    let base_dir = temp.path().join("nested").join("daemon");
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(config_for(&base_dir, 3002), Box::new(launcher.clone()))
        .with_resolver(Box::new(InstallingResolver));

    supervisor.start().unwrap();

    assert!(base_dir.is_dir());
    assert_eq!(launcher.state().launches.len(), 1);
}

#[test]
fn test_directory_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    fs::write(&blocker, b"not a directory").unwrap();

    let launcher = FakeLauncher::default();
    let supervisor =
        Supervisor::with_launcher(config_for(&blocker.join("daemon"), 3002), Box::new(launcher.clone()));

    let err = supervisor.start().unwrap_err();
    assert!(matches!(err, VitoError::Directory { .. }), "got {:?}", err);
    assert!(launcher.state().launches.is_empty());
}

// =============================================================================
// Binary Resolution Tests
// =============================================================================

#[test]
fn test_missing_binary() {
    let temp = TempDir::new().unwrap();
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(config_for(temp.path(), 3002), Box::new(launcher.clone()));

    let err = supervisor.start().unwrap_err();

    assert!(matches!(err, VitoError::BinaryMissing(_)));
    assert!(launcher.state().launches.is_empty());
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[test]
fn test_resolver_installs_binary() {
    let temp = TempDir::new().unwrap();
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(config_for(temp.path(), 3002), Box::new(launcher.clone()))
        .with_resolver(Box::new(InstallingResolver));

    supervisor.start().unwrap();

    assert!(supervisor.status().binary_exists);
    assert_eq!(launcher.state().launches.len(), 1);
}

#[test]
fn test_resolver_failure_is_binary_missing() {
    let temp = TempDir::new().unwrap();
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(config_for(temp.path(), 3002), Box::new(launcher.clone()))
        .with_resolver(Box::new(FailingResolver));

    assert!(matches!(supervisor.start(), Err(VitoError::BinaryMissing(_))));
    assert!(launcher.state().launches.is_empty());
}

#[cfg(unix)]
#[test]
fn test_binary_marked_executable() {
    use std::os::unix::fs::PermissionsExt;

    let (temp, _launcher, supervisor) = setup();
    supervisor.start().unwrap();

    let binary = temp.path().join(Platform::current().binary_name());
    let mode = fs::metadata(binary).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[test]
fn test_platform_lookup() {
    assert_eq!(Platform::Windows.binary_name(), "vcontrold.exe");
    assert_eq!(Platform::Linux.binary_name(), "vcontrold");
    assert_eq!(Platform::LinuxArm.release_id(), Some("linux_arm"));
    assert_eq!(Platform::MacOs.release_id(), None);
}

// =============================================================================
// Stop Tests
// =============================================================================

#[test]
fn test_stop_without_start() {
    let (_temp, launcher, supervisor) = setup();

    supervisor.stop().unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(launcher.state().terminates, 0);
}

#[test]
fn test_graceful_stop() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();

    supervisor.stop().unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(supervisor.pid(), None);
    let state = launcher.state();
    assert_eq!(state.terminates, 1);
    assert_eq!(state.kills, 0);
}

#[test]
fn test_stop_kills_stubborn_process() {
    let (_temp, launcher, supervisor) = setup();
    launcher.state().ignore_terminate = true;
    supervisor.start().unwrap();

    supervisor.stop().unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(!supervisor.is_running());
    assert_eq!(launcher.state().kills, 1);
}

#[test]
fn test_restart() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();

    supervisor.restart().unwrap();

    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert_eq!(supervisor.pid(), Some(1002));
    assert_eq!(launcher.state().launches.len(), 2);
}

#[test]
fn test_drop_stops_process() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();

    drop(supervisor);

    assert_eq!(launcher.state().terminates, 1);
}

// =============================================================================
// Crash Detection Tests
// =============================================================================

#[test]
fn test_crash_detected() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();

    launcher.state().exited = Some(ExitInfo { code: Some(1) });

    assert!(!supervisor.is_running());
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(supervisor.pid(), None);
    assert_eq!(supervisor.status().last_exit_code, Some(1));
}

#[test]
fn test_ensure_running_restarts_crashed_daemon() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();
    launcher.state().exited = Some(ExitInfo { code: Some(1) });

    assert!(supervisor.ensure_running().unwrap());

    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert_eq!(launcher.state().launches.len(), 2);
}

#[test]
fn test_unqueryable_daemon_is_stopped_before_relaunch() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();
    launcher.state().query_error = true;

    assert!(supervisor.ensure_running().unwrap());

    let state = launcher.state();
    assert_eq!(state.launches.len(), 2);
    // The first daemon was signalled and killed, not abandoned
    assert_eq!(state.terminates, 1);
    assert_eq!(state.kills, 1);
    drop(state);
    assert_eq!(supervisor.pid(), Some(1002));
}

#[test]
fn test_unqueryable_daemon_reported_not_running() {
    let (_temp, launcher, supervisor) = setup();
    supervisor.start().unwrap();
    launcher.state().query_error = true;

    assert!(!supervisor.is_running());
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(supervisor.pid(), None);
    assert_eq!(launcher.state().kills, 1);
}

#[test]
fn test_ensure_running_checks_health_of_live_daemon() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let temp = TempDir::new().unwrap();
    install_binary(temp.path());
    let launcher = FakeLauncher::default();
    let supervisor = Supervisor::with_launcher(config_for(temp.path(), port), Box::new(launcher.clone()));
    supervisor.start().unwrap();

    assert!(supervisor.ensure_running().unwrap());
    assert_eq!(supervisor.health_check_count(), 1);

    // Alive but unreachable is reported, not restarted
    drop(listener);
    assert!(!supervisor.ensure_running().unwrap());
    assert_eq!(launcher.state().launches.len(), 1);
}

// =============================================================================
// Health and Status Tests
// =============================================================================

#[test]
fn test_health_check_counts() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let temp = TempDir::new().unwrap();
    let supervisor = Supervisor::with_launcher(config_for(temp.path(), port), Box::new(FakeLauncher::default()));

    assert!(supervisor.status().last_health_check_unix_ms.is_none());
    assert!(supervisor.health_check());

    drop(listener);
    assert!(!supervisor.health_check());

    let status = supervisor.status();
    assert_eq!(status.health_checks, 2);
    assert!(status.last_health_check_unix_ms.is_some());
}

#[test]
fn test_status_snapshot() {
    let (temp, _launcher, supervisor) = setup();

    let status = supervisor.status();
    assert_eq!(status.state, SupervisorState::Stopped);
    assert!(!status.running);
    assert!(status.uptime_secs.is_none());

    supervisor.start().unwrap();
    let status = supervisor.status();

    assert!(status.running);
    assert_eq!(status.pid, Some(1001));
    assert!(status.binary_exists);
    assert_eq!(status.log_file, temp.path().join("vcontrold.log"));
    assert_eq!(status.port, 3002);
    assert!(status.uptime_secs.is_some());
    assert!(status.start_time_unix_ms.is_some());

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "Running");
}
