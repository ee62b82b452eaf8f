//! Supervisor Module
//!
//! Keeps the external vcontrold daemon alive.
//!
//! ## Lifecycle
//! ```text
//!  Stopped ──start──▶ Starting ──grace period──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                        │
//!                        └── exited during grace ──▶ Failed
//! ```
//!
//! ## Liveness
//! Two independent signals:
//! - the OS process has not exited (`is_running`)
//! - the daemon accepts TCP connections (`health_check`)
//!
//! A process that is alive but unreachable is a distinct failure mode.

mod platform;
mod process;
mod health;
mod manager;

pub use platform::{BinaryResolver, Platform};
pub use process::{ExitInfo, LaunchSpec, ManagedProcess, OsLauncher, OsProcess, ProcessLauncher};
pub use health::probe;
pub use manager::{BinaryInfo, Supervisor, SupervisorState, SupervisorStatus};
