/// Host membership records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host identifier, unique within a lockspace. Valid ids start at 1.
pub type HostId = u64;

/// Liveness of a host in a lockspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostFlags {
    /// The host holds its delta lease and may own resources.
    Live,
    /// The host is known but has no lease (left, or not rejoined since restart).
    Free,
}

impl fmt::Display for HostFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Free => f.write_str("free"),
        }
    }
}

/// A host that joined a lockspace at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: HostId,
    /// Fencing generation, bumped on every rejoin and never reset.
    pub generation: u64,
    pub flags: HostFlags,
}

impl HostRecord {
    pub fn is_live(&self) -> bool {
        self.flags == HostFlags::Live
    }
}
