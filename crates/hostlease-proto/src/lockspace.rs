/// Lockspace metadata and request options.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defaults::*;
use crate::geometry::Geometry;

/// Persisted lockspace metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockspaceInfo {
    pub name: String,
    /// Shared storage path holding the delta leases
    pub path: String,
    /// Byte offset of the lockspace area within `path`
    pub offset: u64,
    /// Host slots in the lockspace; host ids run from 1 to this value
    pub max_hosts: u32,
    /// I/O timeout in seconds, 0 for the service default
    pub iotimeout: u32,
    pub geometry: Geometry,
}

/// Membership state of a lockspace as seen from this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockspaceState {
    /// No metadata was ever written.
    Absent,
    /// Metadata written, no host joined.
    Persisted,
    /// Asynchronous join requested, not completed.
    Joining,
    /// This host holds its delta lease.
    Active,
    /// Asynchronous leave requested, not completed.
    Leaving,
}

impl fmt::Display for LockspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Persisted => "persisted",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Leaving => "leaving",
        };
        f.write_str(s)
    }
}

/// Whether a join or leave completes before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Sync,
    /// Return immediately; the operation finishes on `complete_async`.
    Async,
}

/// Options for `write_lockspace`.
///
/// Alignment and sector are raw byte values so that malformed input can
/// be reported at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockspaceOptions {
    pub offset: u64,
    pub max_hosts: u32,
    pub iotimeout: u32,
    pub align: u64,
    pub sector: u64,
}

impl Default for LockspaceOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            max_hosts: DEFAULT_MAX_HOSTS,
            iotimeout: DEFAULT_IO_TIMEOUT_SECS,
            align: DEFAULT_ALIGNMENT,
            sector: DEFAULT_SECTOR,
        }
    }
}

/// Options for `add_lockspace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    pub offset: u64,
    pub iotimeout: u32,
    pub mode: Mode,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            iotimeout: DEFAULT_IO_TIMEOUT_SECS,
            mode: Mode::Sync,
        }
    }
}

impl JoinOptions {
    pub fn asynchronous() -> Self {
        Self {
            mode: Mode::Async,
            ..Self::default()
        }
    }
}
