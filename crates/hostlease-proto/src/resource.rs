/// Resource leader records, disk locations and session handles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defaults::{DEFAULT_ALIGNMENT, DEFAULT_SECTOR};
use crate::error::LkResult;
use crate::geometry::Geometry;
use crate::host::HostId;

/// A (path, byte offset) location holding one leader record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiskLocation {
    pub path: String,
    pub offset: u64,
}

impl DiskLocation {
    pub fn new(path: impl Into<String>, offset: u64) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

impl fmt::Display for DiskLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.offset)
    }
}

/// The leader record of a resource, identical on every mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLeader {
    pub lockspace: String,
    pub resource: String,
    /// Bumped on every successful acquire
    pub version: u64,
    pub acquired: bool,
    /// Owning host, 0 when not acquired
    pub host_id: HostId,
    /// Generation of the owner at acquisition. Kept after release.
    pub generation: u64,
    pub geometry: Geometry,
    /// Mirror set the resource was written to, in order
    pub disks: Vec<DiskLocation>,
}

impl ResourceLeader {
    /// A freshly written, never acquired leader.
    pub fn new(lockspace: &str, resource: &str, disks: &[DiskLocation], geometry: Geometry) -> Self {
        Self {
            lockspace: lockspace.to_string(),
            resource: resource.to_string(),
            version: 0,
            acquired: false,
            host_id: 0,
            generation: 0,
            geometry,
            disks: disks.to_vec(),
        }
    }

    pub fn align(&self) -> u64 {
        self.geometry.align.bytes()
    }

    pub fn sector(&self) -> u64 {
        self.geometry.sector.bytes()
    }

    /// The fencing token recorded at acquisition, if held.
    pub fn owner(&self) -> Option<Owner> {
        self.acquired.then_some(Owner {
            host_id: self.host_id,
            generation: self.generation,
        })
    }
}

/// A current owner of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub host_id: HostId,
    pub generation: u64,
}

/// Alignment and sector of a resource request, as raw byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOptions {
    pub align: u64,
    pub sector: u64,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            align: DEFAULT_ALIGNMENT,
            sector: DEFAULT_SECTOR,
        }
    }
}

impl ResourceOptions {
    pub fn new(align: u64, sector: u64) -> Self {
        Self { align, sector }
    }

    /// Validate the raw values into a [`Geometry`].
    pub fn geometry(&self) -> LkResult<Geometry> {
        Geometry::new(self.align, self.sector)
    }
}

/// Handle of a registered client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Session(pub u64);

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}
