//! Platform lookup
//!
//! Which daemon binary to expect and which release to fetch.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Target platforms of the daemon binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    LinuxArm,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform this build runs on
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            Platform::LinuxArm
        } else {
            Platform::Linux
        }
    }

    /// File name of the daemon binary inside the working directory
    pub fn binary_name(&self) -> &'static str {
        match self {
            Platform::Windows => "vcontrold.exe",
            Platform::Linux | Platform::LinuxArm | Platform::MacOs => "vcontrold",
        }
    }

    /// Release identifier understood by binary resolvers (None: no release)
    pub fn release_id(&self) -> Option<&'static str> {
        match self {
            Platform::Linux => Some("linux"),
            Platform::LinuxArm => Some("linux_arm"),
            Platform::Windows => Some("windows"),
            Platform::MacOs => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::LinuxArm => "linux_arm",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        };
        f.write_str(name)
    }
}

/// Supplies a daemon binary when none is installed
///
/// Implementations typically download and unpack a release; the supervisor
/// only consumes the returned path.
pub trait BinaryResolver: Send + Sync {
    /// Return a usable executable for `platform`, installed under `install_dir`
    fn resolve(&self, platform: Platform, install_dir: &Path) -> Result<PathBuf>;
}
