//! # vitolink
//!
//! Talks to a Viessmann heating controller, either directly over a serial
//! line or through a locally supervised `vcontrold` daemon:
//! - Raw wire codec with CRC-16 framing
//! - Serial and TCP (daemon line protocol) transports
//! - Read cache with a fixed TTL to bound the request rate
//! - Supervision of the external daemon process
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host application                         │
//! │        read / write / set_operating_mode / ensure_running    │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//! ┌──────────────▼──────────────┐   ┌────────────▼──────────────┐
//! │        CachedClient          │   │        Supervisor          │
//! │   (ReadCache + one link)     │   │ (process + TCP liveness)   │
//! └──────────────┬──────────────┘   └────────────┬──────────────┘
//!                │                               │ spawns
//!       ┌────────┴────────┐                      ▼
//!       ▼                 ▼               ┌─────────────┐
//! ┌───────────┐    ┌────────────┐  TCP    │  vcontrold  │
//! │  Serial   │    │    Tcp     │ ──────▶ │   daemon    │
//! │ Transport │    │ Transport  │         └──────┬──────┘
//! └─────┬─────┘    └────────────┘                │
//!       │ FrameCodec       LineCodec             │
//!       ▼                                        ▼
//!   ┌───────────────────────────────────────────────────┐
//!   │              Heating controller (serial)           │
//!   └───────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod transport;
pub mod cache;
pub mod client;
pub mod supervisor;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{VitoError, Result};
pub use config::Config;
pub use client::{CachedClient, ClientInfo, DaemonClient, DynClient, SerialClient};
pub use supervisor::Supervisor;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vitolink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
