//! File backend.
//!
//! The snapshot is bincode-encoded into `{dir}/leases`. Saves write
//! `{dir}/leases.tmp` first and rename it over the old file, so a crash
//! leaves either the previous or the new snapshot, never a torn one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hostlease_proto::defaults::{STATE_FILE_NAME, STATE_TMP_SUFFIX};
use hostlease_proto::error::{LkError, LkResult};
use tokio::fs;
use tracing::{debug, error};

use super::{MetadataBackend, Snapshot};

pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir` as the state directory, creating it if needed.
    pub async fn open(dir: &Path) -> LkResult<Self> {
        fs::create_dir_all(dir).await.map_err(|e| {
            error!("failed to create state directory {}: {}", dir.display(), e);
            LkError::Io
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE_NAME)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", STATE_FILE_NAME, STATE_TMP_SUFFIX))
    }
}

#[async_trait]
impl MetadataBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> LkResult<Option<Snapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).await.map_err(|e| {
            error!("failed to read state from {}: {}", path.display(), e);
            LkError::Io
        })?;
        let snapshot: Snapshot = bincode::deserialize(&data).map_err(|_| {
            error!("corrupt state file: {}", path.display());
            LkError::Io
        })?;
        debug!(
            "loaded state: {} lockspaces, {} leaders",
            snapshot.store.lockspaces().count(),
            snapshot.store.leaders().count()
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> LkResult<()> {
        let path = self.path();
        let tmp = self.tmp_path();
        let data = bincode::serialize(snapshot).map_err(|_| LkError::Io)?;
        fs::write(&tmp, &data).await.map_err(|e| {
            error!("failed to write state to {}: {}", tmp.display(), e);
            LkError::Io
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            error!("failed to replace {}: {}", path.display(), e);
            LkError::Io
        })?;
        debug!("saved state ({} bytes)", data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlease_proto::geometry::Geometry;
    use hostlease_proto::lockspace::LockspaceInfo;
    use hostlease_proto::resource::{DiskLocation, ResourceLeader};

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.store.put_lockspace(LockspaceInfo {
            name: "ls".to_string(),
            path: "/dev/vg/ids".to_string(),
            offset: 0,
            max_hosts: 2000,
            iotimeout: 0,
            geometry: Geometry::default(),
        });
        let disks = [DiskLocation::new("/dev/vg/leases", 1 << 20)];
        snapshot.store.store_mirrors(
            &disks,
            &ResourceLeader::new("ls", "res", &disks, Geometry::default()),
        );
        snapshot.hosts.join("ls", 1);
        snapshot
    }

    #[tokio::test]
    async fn test_load_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).await.unwrap();
        assert_eq!(backend.name(), "file");
        assert_eq!(backend.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(&tmp.path().join("state")).await.unwrap();
        let snapshot = sample();
        backend.save(&snapshot).await.unwrap();

        assert!(backend.path().exists());
        assert!(!backend.tmp_path().exists());
        assert_eq!(backend.load().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).await.unwrap();
        std::fs::write(backend.path(), b"\xff\xff\xff").unwrap();
        assert_eq!(backend.load().await.unwrap_err(), LkError::Io);
    }
}
