//! Cache Module
//!
//! Recent successful reads, keyed by command name.
//!
//! ## Responsibilities
//! - Serve a read without I/O while it is younger than the TTL
//! - Drop the paired read when a write succeeds
//! - Never hand out an expired value
//!
//! ## Data Structure Choice
//! HashMap wrapped in a parking_lot RwLock:
//! - A handful of keys, no ordering needed
//! - Readers don't block each other

mod table;

pub use table::ReadCache;

use std::time::Instant;

/// A cached reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    /// Last successfully decoded value
    pub value: f64,

    /// When the value was fetched
    pub fetched_at: Instant,
}
