//! Metadata store: lockspace records and per-disk resource leaders.
//!
//! Pure data and validation. Callers provide the locking; the manager
//! keeps one store inside its state lock and hands clones to the
//! persistence backend.

use std::collections::BTreeMap;

use hostlease_proto::constants::{LOCKSPACE_NAME_MAX, RESOURCE_NAME_MAX};
use hostlease_proto::error::{LkError, LkResult};
use hostlease_proto::geometry::Geometry;
use hostlease_proto::lockspace::LockspaceInfo;
use hostlease_proto::resource::{DiskLocation, ResourceLeader};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lockspace metadata keyed by name, and leader records keyed by disk location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStore {
    lockspaces: BTreeMap<String, LockspaceInfo>,
    leaders: BTreeMap<DiskLocation, ResourceLeader>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store lockspace metadata, returning the record it replaced.
    pub fn put_lockspace(&mut self, info: LockspaceInfo) -> Option<LockspaceInfo> {
        self.lockspaces.insert(info.name.clone(), info)
    }

    pub fn lockspace(&self, name: &str) -> Option<&LockspaceInfo> {
        self.lockspaces.get(name)
    }

    pub fn has_lockspace(&self, name: &str) -> bool {
        self.lockspaces.contains_key(name)
    }

    pub fn lockspaces(&self) -> impl Iterator<Item = &LockspaceInfo> {
        self.lockspaces.values()
    }

    /// Read the leader at one location.
    pub fn leader(&self, disk: &DiskLocation) -> LkResult<&ResourceLeader> {
        self.leaders.get(disk).ok_or(LkError::LeaderNotFound)
    }

    /// Read the leader at one location, checking the requested geometry.
    pub fn read_leader(&self, disk: &DiskLocation, geometry: Geometry) -> LkResult<&ResourceLeader> {
        let leader = self.leader(disk)?;
        geometry.ensure_matches(leader.geometry)?;
        Ok(leader)
    }

    pub fn leaders(&self) -> impl Iterator<Item = (&DiskLocation, &ResourceLeader)> {
        self.leaders.iter()
    }

    /// Read a resource from all of its mirrors.
    ///
    /// Every location must hold a leader for `lockspace`/`resource` written
    /// with `geometry`, `disks` must be the mirror set the resource was
    /// written to, and all mirrors must be identical.
    pub fn load_mirrors(
        &self,
        lockspace: &str,
        resource: &str,
        disks: &[DiskLocation],
        geometry: Geometry,
    ) -> LkResult<ResourceLeader> {
        let (first, rest) = disks.split_first().ok_or(LkError::InvalidArgument)?;
        let leader = self.read_leader(first, geometry)?;
        if leader.lockspace != lockspace || leader.resource != resource {
            debug!(
                "leader at {} belongs to {}/{}, not {}/{}",
                first, leader.lockspace, leader.resource, lockspace, resource
            );
            return Err(LkError::LeaderNotFound);
        }
        if leader.disks != disks {
            debug!(
                "{}/{} was written to {} mirror(s), request names {}",
                lockspace,
                resource,
                leader.disks.len(),
                disks.len()
            );
            return Err(LkError::MirrorMismatch);
        }
        for disk in rest {
            let mirror = self.read_leader(disk, geometry)?;
            if mirror != leader {
                debug!("leader at {} differs from {}", disk, first);
                return Err(LkError::MirrorMismatch);
            }
        }
        Ok(leader.clone())
    }

    /// Write the same leader to every mirror.
    pub fn store_mirrors(&mut self, disks: &[DiskLocation], leader: &ResourceLeader) {
        for disk in disks {
            self.leaders.insert(disk.clone(), leader.clone());
        }
    }
}

/// Check a lockspace name against the on-disk name field.
pub fn validate_lockspace_name(name: &str) -> LkResult<()> {
    if name.is_empty() || name.len() > LOCKSPACE_NAME_MAX {
        return Err(LkError::InvalidArgument);
    }
    Ok(())
}

/// Check a resource name against the on-disk name field.
pub fn validate_resource_name(name: &str) -> LkResult<()> {
    if name.is_empty() || name.len() > RESOURCE_NAME_MAX {
        return Err(LkError::InvalidArgument);
    }
    Ok(())
}

/// Resource leaders must start on an alignment boundary.
pub fn validate_disks(disks: &[DiskLocation], geometry: Geometry) -> LkResult<()> {
    if disks.is_empty() {
        return Err(LkError::InvalidArgument);
    }
    let align = geometry.align.bytes();
    for disk in disks {
        if disk.path.is_empty() || disk.offset % align != 0 {
            debug!("disk {} is not aligned to {}", disk, align);
            return Err(LkError::InvalidArgument);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlease_proto::constants::{ALIGNMENT_1M, SECTOR_4K};

    fn disk(offset: u64) -> DiskLocation {
        DiskLocation::new("path", offset)
    }

    #[test]
    fn test_leader_not_found() {
        let store = MetadataStore::new();
        assert_eq!(store.leader(&disk(0)).unwrap_err(), LkError::LeaderNotFound);
    }

    #[test]
    fn test_read_leader_geometry() {
        let mut store = MetadataStore::new();
        let leader = ResourceLeader::new("ls", "res", &[disk(ALIGNMENT_1M)], Geometry::default());
        store.store_mirrors(&leader.disks, &leader);

        assert_eq!(store.read_leader(&disk(ALIGNMENT_1M), Geometry::default()).unwrap(), &leader);
        let other = Geometry::new(ALIGNMENT_1M, SECTOR_4K).unwrap();
        assert_eq!(
            store.read_leader(&disk(ALIGNMENT_1M), other).unwrap_err(),
            LkError::GeometryMismatch
        );
    }

    #[test]
    fn test_load_mirrors_agree() {
        let mut store = MetadataStore::new();
        let disks = vec![disk(0), DiskLocation::new("mirror", ALIGNMENT_1M)];
        let leader = ResourceLeader::new("ls", "res", &disks, Geometry::default());
        store.store_mirrors(&disks, &leader);

        let loaded = store.load_mirrors("ls", "res", &disks, Geometry::default()).unwrap();
        assert_eq!(loaded, leader);
    }

    #[test]
    fn test_load_mirrors_other_disk_set() {
        let mut store = MetadataStore::new();
        let disks = vec![disk(0), DiskLocation::new("mirror", ALIGNMENT_1M)];
        let leader = ResourceLeader::new("ls", "res", &disks, Geometry::default());
        store.store_mirrors(&disks, &leader);

        let reversed = vec![disks[1].clone(), disks[0].clone()];
        for subset in [&disks[..1], &disks[1..], &reversed[..]] {
            assert_eq!(
                store.load_mirrors("ls", "res", subset, Geometry::default()).unwrap_err(),
                LkError::MirrorMismatch
            );
        }
    }

    #[test]
    fn test_load_mirrors_disagree() {
        let mut store = MetadataStore::new();
        let disks = vec![disk(0), DiskLocation::new("mirror", 0)];
        let leader = ResourceLeader::new("ls", "res", &disks, Geometry::default());
        store.store_mirrors(&disks, &leader);

        let mut stale = leader.clone();
        stale.version = 7;
        store.store_mirrors(&disks[1..], &stale);

        assert_eq!(
            store.load_mirrors("ls", "res", &disks, Geometry::default()).unwrap_err(),
            LkError::MirrorMismatch
        );
    }

    #[test]
    fn test_load_mirrors_wrong_identity() {
        let mut store = MetadataStore::new();
        let leader = ResourceLeader::new("ls", "res", &[disk(0)], Geometry::default());
        store.store_mirrors(&leader.disks, &leader);

        assert_eq!(
            store.load_mirrors("ls", "other", &[disk(0)], Geometry::default()).unwrap_err(),
            LkError::LeaderNotFound
        );
        assert_eq!(
            store.load_mirrors("ls", "res", &[], Geometry::default()).unwrap_err(),
            LkError::InvalidArgument
        );
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_lockspace_name("ls").is_ok());
        assert!(validate_lockspace_name("").is_err());
        assert!(validate_resource_name(&"r".repeat(RESOURCE_NAME_MAX + 1)).is_err());
    }

    #[test]
    fn test_validate_disks_alignment() {
        let g = Geometry::default();
        assert!(validate_disks(&[disk(0), disk(ALIGNMENT_1M)], g).is_ok());
        assert_eq!(validate_disks(&[disk(42)], g), Err(LkError::InvalidArgument));
        assert_eq!(validate_disks(&[], g), Err(LkError::InvalidArgument));
    }
}
