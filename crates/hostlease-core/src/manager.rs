//! The lock manager API.
//!
//! `LockManager` owns the metadata store, the host registry and the
//! per-lockspace membership behind one `RwLock`, so every
//! read-validate-mutate sequence is atomic with respect to concurrent
//! callers. Durable changes are applied to a copy of the snapshot, saved
//! through the backend while the lock is held, and only then installed;
//! a failed save leaves the in-memory state untouched.
//!
//! Only `inq_lockspace` with `wait = true` suspends, and it does so after
//! releasing the lock.

use std::collections::HashMap;

use hostlease_proto::defaults::DEFAULT_DISK_SECTOR;
use hostlease_proto::error::{LkError, LkResult};
use hostlease_proto::geometry::{Geometry, SectorSize};
use hostlease_proto::host::{HostId, HostRecord};
use hostlease_proto::lockspace::{
    JoinOptions, LockspaceInfo, LockspaceOptions, LockspaceState, Mode,
};
use hostlease_proto::op::Operation;
use hostlease_proto::resource::{DiskLocation, Owner, ResourceLeader, ResourceOptions, Session};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::backend::{MemoryBackend, MetadataBackend, Snapshot};
use crate::faults::{FailureInjector, FaultMode};
use crate::session::{HeldResource, SessionTable};
use crate::store::{validate_disks, validate_lockspace_name, validate_resource_name};
use crate::ticket::{Membership, TicketKind};

/// Runtime configuration of a manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Logical sector size of the shared storage. Lockspaces must be
    /// written with this sector size.
    pub disk_sector: SectorSize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            disk_sector: DEFAULT_DISK_SECTOR,
        }
    }
}

impl ManagerConfig {
    pub fn with_disk_sector(disk_sector: SectorSize) -> Self {
        Self { disk_sector }
    }
}

/// State guarded by the manager lock.
#[derive(Default)]
struct State {
    snapshot: Snapshot,
    members: HashMap<String, Membership>,
}

impl State {
    fn lockspace(&self, name: &str) -> LkResult<&LockspaceInfo> {
        self.snapshot.store.lockspace(name).ok_or(LkError::NoSpace)
    }

    fn member(&self, name: &str) -> Option<&Membership> {
        self.members.get(name)
    }

    fn member_mut(&mut self, name: &str) -> &mut Membership {
        self.members.entry(name.to_string()).or_default()
    }

    fn state_of(&self, name: &str) -> LockspaceState {
        if !self.snapshot.store.has_lockspace(name) {
            return LockspaceState::Absent;
        }
        self.member(name)
            .map(Membership::state)
            .unwrap_or(LockspaceState::Persisted)
    }
}

/// In-process disk-lease lock manager.
pub struct LockManager {
    config: ManagerConfig,
    state: RwLock<State>,
    backend: Box<dyn MetadataBackend>,
    sessions: SessionTable,
    faults: FailureInjector,
}

impl LockManager {
    /// Create a manager that keeps its metadata in memory only.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            backend: Box::new(MemoryBackend::new()),
            sessions: SessionTable::new(),
            faults: FailureInjector::new(),
        }
    }

    /// Create a manager on top of a persistence backend, loading its
    /// last snapshot.
    ///
    /// No lease survives a restart: every loaded host is marked free and
    /// every lockspace starts out persisted, so hosts must join again and
    /// receive a new generation.
    pub async fn open(config: ManagerConfig, backend: Box<dyn MetadataBackend>) -> LkResult<Self> {
        let mut state = State::default();
        if let Some(mut snapshot) = backend.load().await? {
            snapshot.hosts.mark_all_free();
            for info in snapshot.store.lockspaces() {
                state.members.insert(info.name.clone(), Membership::new());
            }
            state.snapshot = snapshot;
        }
        info!(
            "lock manager opened on {} backend, disk sector {}",
            backend.name(),
            config.disk_sector.bytes()
        );
        Ok(Self {
            config,
            state: RwLock::new(state),
            backend,
            sessions: SessionTable::new(),
            faults: FailureInjector::new(),
        })
    }

    pub fn config(&self) -> ManagerConfig {
        self.config
    }

    /// Save `next` and install it as the current snapshot.
    async fn commit(&self, state: &mut State, next: Snapshot) -> LkResult<()> {
        self.backend.save(&next).await.map_err(|e| {
            error!("failed to persist lock metadata on {}: {}", self.backend.name(), e);
            e
        })?;
        state.snapshot = next;
        Ok(())
    }

    // ─── Lockspaces ─────────────────────────────────────────────────────────

    /// Write lockspace metadata, creating or overwriting it.
    pub async fn write_lockspace(
        &self,
        name: &str,
        path: &str,
        opts: LockspaceOptions,
    ) -> LkResult<()> {
        self.faults.check(Operation::WriteLockspace)?;
        let geometry = Geometry::new(opts.align, opts.sector)?;
        validate_lockspace_name(name)?;
        if path.is_empty() {
            return Err(LkError::InvalidArgument);
        }
        let limit = geometry.max_hosts().ok_or(LkError::InvalidArgument)?;
        if geometry.sector != self.config.disk_sector {
            debug!(
                "lockspace {} sector {} does not match disk sector {}",
                name,
                geometry.sector.bytes(),
                self.config.disk_sector.bytes()
            );
            return Err(LkError::DiskSectorMismatch);
        }
        let max_hosts = match opts.max_hosts {
            0 => limit,
            n if n <= limit => n,
            _ => return Err(LkError::InvalidArgument),
        };

        let info = LockspaceInfo {
            name: name.to_string(),
            path: path.to_string(),
            offset: opts.offset,
            max_hosts,
            iotimeout: opts.iotimeout,
            geometry,
        };

        let mut state = self.state.write().await;
        let mut next = state.snapshot.clone();
        if let Some(old) = next.store.put_lockspace(info) {
            if state.state_of(name) != LockspaceState::Persisted {
                warn!(
                    "overwriting lockspace {} ({}:{}) while it is {}",
                    name,
                    old.path,
                    old.offset,
                    state.state_of(name)
                );
            }
        }
        self.commit(&mut state, next).await?;
        state.member_mut(name);
        info!("wrote lockspace {} at {}:{} ({})", name, path, opts.offset, geometry);
        Ok(())
    }

    /// Read persisted lockspace metadata.
    pub async fn read_lockspace(&self, name: &str) -> LkResult<LockspaceInfo> {
        let state = self.state.read().await;
        state.lockspace(name).cloned()
    }

    /// Current membership state of a lockspace.
    pub async fn lockspace_state(&self, name: &str) -> LockspaceState {
        self.state.read().await.state_of(name)
    }

    /// Join a lockspace as `host_id`.
    ///
    /// A synchronous join is active on return. An asynchronous join
    /// leaves the lockspace joining until `complete_async`.
    pub async fn add_lockspace(
        &self,
        name: &str,
        host_id: HostId,
        path: &str,
        opts: JoinOptions,
    ) -> LkResult<()> {
        self.faults.check(Operation::AddLockspace)?;
        let mut state = self.state.write().await;
        let info = state.lockspace(name)?;
        if info.path != path || info.offset != opts.offset {
            debug!(
                "add_lockspace {}: {}:{} does not match {}:{}",
                name, path, opts.offset, info.path, info.offset
            );
            return Err(LkError::NoSpace);
        }
        if host_id == 0 || host_id > u64::from(info.max_hosts) {
            return Err(LkError::InvalidArgument);
        }
        if state.state_of(name) != LockspaceState::Persisted {
            return Err(LkError::Exists);
        }

        match opts.mode {
            Mode::Sync => {
                let mut next = state.snapshot.clone();
                let record = next.hosts.join(name, host_id);
                self.commit(&mut state, next).await?;
                state.member_mut(name).activate(host_id, opts.iotimeout)?;
                info!(
                    "host {} joined lockspace {} at generation {}",
                    host_id, name, record.generation
                );
            }
            Mode::Async => {
                state.member_mut(name).begin_join(host_id, opts.iotimeout)?;
                info!("host {} joining lockspace {}", host_id, name);
            }
        }
        Ok(())
    }

    /// Leave a lockspace. The host's generation is kept for its next join.
    pub async fn rem_lockspace(
        &self,
        name: &str,
        host_id: HostId,
        path: &str,
        mode: Mode,
    ) -> LkResult<()> {
        self.faults.check(Operation::RemLockspace)?;
        let mut state = self.state.write().await;
        let info = state.lockspace(name)?;
        if info.path != path {
            return Err(LkError::NoSpace);
        }
        if state.member(name).and_then(Membership::active_host) != Some(host_id) {
            return Err(LkError::NotPermitted);
        }

        match mode {
            Mode::Sync => {
                let mut next = state.snapshot.clone();
                next.hosts.leave(name, host_id);
                self.commit(&mut state, next).await?;
                state.member_mut(name).deactivate(host_id)?;
                info!("host {} left lockspace {}", host_id, name);
            }
            Mode::Async => {
                state.member_mut(name).begin_leave(host_id)?;
                info!("host {} leaving lockspace {}", host_id, name);
            }
        }
        Ok(())
    }

    /// Finish the pending join or leave of a lockspace and wake every
    /// caller waiting on it.
    pub async fn complete_async(&self, name: &str) -> LkResult<()> {
        self.faults.check(Operation::CompleteAsync)?;
        let mut state = self.state.write().await;
        state.lockspace(name)?;
        let ticket = state
            .member(name)
            .and_then(Membership::pending)
            .ok_or(LkError::NotPermitted)?;

        let mut next = state.snapshot.clone();
        match ticket.kind {
            TicketKind::Join => {
                let record = next.hosts.join(name, ticket.host_id);
                info!(
                    "host {} joined lockspace {} at generation {}",
                    ticket.host_id, name, record.generation
                );
            }
            TicketKind::Leave => {
                next.hosts.leave(name, ticket.host_id);
                info!("host {} left lockspace {}", ticket.host_id, name);
            }
        }
        self.commit(&mut state, next).await?;
        state.member_mut(name).complete()?;
        Ok(())
    }

    /// Ask whether `host_id` holds the lockspace.
    ///
    /// Returns `Some(true)` when joined, `Some(false)` when not, and `None`
    /// while a join or leave is pending. With `wait`, a pending operation
    /// is waited for and its outcome returned instead. One ticket is open
    /// per lockspace, so the first completion after the wait starts is the
    /// one being waited for, even if another ticket opens before the waiter
    /// runs again.
    pub async fn inq_lockspace(
        &self,
        name: &str,
        host_id: HostId,
        path: &str,
        wait: bool,
    ) -> LkResult<Option<bool>> {
        self.faults.check(Operation::InqLockspace)?;
        let (waiter, kind) = {
            let state = self.state.read().await;
            let matches = state
                .snapshot
                .store
                .lockspace(name)
                .is_some_and(|info| info.path == path);
            let member = match state.member(name) {
                Some(m) if matches && m.host_id() == Some(host_id) => m,
                _ => return Ok(Some(false)),
            };
            match member.pending() {
                None => return Ok(member.inquire()),
                Some(_) if !wait => return Ok(None),
                Some(ticket) => (member.waiter(), ticket.kind),
            }
        };

        debug!("waiting for pending {:?} of lockspace {}", kind, name);
        waiter.wait().await?;
        Ok(Some(kind == TicketKind::Join))
    }

    // ─── Resources ──────────────────────────────────────────────────────────

    /// Write a fresh leader record to every disk of a resource.
    ///
    /// The sector size is not checked against the disk: the write
    /// succeeds, and reading it back with the disk's sector size fails.
    pub async fn write_resource(
        &self,
        lockspace: &str,
        resource: &str,
        disks: &[DiskLocation],
        opts: ResourceOptions,
    ) -> LkResult<()> {
        self.faults.check(Operation::WriteResource)?;
        let geometry = opts.geometry()?;
        validate_lockspace_name(lockspace)?;
        validate_resource_name(resource)?;
        geometry.ensure_supported()?;
        validate_disks(disks, geometry)?;

        let leader = ResourceLeader::new(lockspace, resource, disks, geometry);
        let mut state = self.state.write().await;
        let mut next = state.snapshot.clone();
        next.store.store_mirrors(disks, &leader);
        self.commit(&mut state, next).await?;
        self.sessions.forget(lockspace, resource);
        info!(
            "wrote resource {}/{} on {} disk(s) ({})",
            lockspace,
            resource,
            disks.len(),
            geometry
        );
        Ok(())
    }

    /// Read the leader record at one disk location.
    pub async fn read_resource(
        &self,
        disk: &DiskLocation,
        opts: ResourceOptions,
    ) -> LkResult<ResourceLeader> {
        self.faults.check(Operation::ReadResource)?;
        let geometry = opts.geometry()?;
        let state = self.state.read().await;
        let leader = state.snapshot.store.read_leader(disk, geometry)?;
        debug!(
            "read resource {}/{} at {}: acquired={}",
            leader.lockspace, leader.resource, disk, leader.acquired
        );
        Ok(leader.clone())
    }

    /// List the current owners of a resource.
    ///
    /// An owner is reported only while its fencing token is valid: the
    /// host is live in the lockspace at the recorded generation.
    pub async fn read_resource_owners(
        &self,
        lockspace: &str,
        resource: &str,
        disks: &[DiskLocation],
        opts: ResourceOptions,
    ) -> LkResult<Vec<Owner>> {
        self.faults.check(Operation::ReadResourceOwners)?;
        let geometry = opts.geometry()?;
        let state = self.state.read().await;
        if !state.snapshot.hosts.knows_lockspace(lockspace) {
            return Err(LkError::InvalidArgument);
        }
        let leader = state
            .snapshot
            .store
            .load_mirrors(lockspace, resource, disks, geometry)?;
        let owners = leader
            .owner()
            .filter(|o| state.snapshot.hosts.is_current(lockspace, o.host_id, o.generation))
            .into_iter()
            .collect();
        Ok(owners)
    }

    /// Acquire a resource for the host active in `lockspace`.
    ///
    /// The owner's current generation is recorded as the fencing token.
    pub async fn acquire(
        &self,
        lockspace: &str,
        resource: &str,
        disks: &[DiskLocation],
        session: Session,
        opts: ResourceOptions,
    ) -> LkResult<()> {
        self.faults.check(Operation::Acquire)?;
        let geometry = opts.geometry()?;
        let mut state = self.state.write().await;
        let host_id = state
            .member(lockspace)
            .and_then(Membership::active_host)
            .ok_or(LkError::NoSpace)?;
        if !self.sessions.contains(session) {
            return Err(LkError::InvalidArgument);
        }
        let mut leader = state
            .snapshot
            .store
            .load_mirrors(lockspace, resource, disks, geometry)?;
        if leader.acquired {
            debug!(
                "{}/{} already held by host {} generation {}",
                lockspace, resource, leader.host_id, leader.generation
            );
            return Err(LkError::Exists);
        }
        let generation = state
            .snapshot
            .hosts
            .get(lockspace, host_id)
            .map(|h| h.generation)
            .ok_or(LkError::NoSpace)?;

        leader.acquired = true;
        leader.host_id = host_id;
        leader.generation = generation;
        leader.version += 1;

        let mut next = state.snapshot.clone();
        next.store.store_mirrors(disks, &leader);
        self.commit(&mut state, next).await?;
        self.sessions.hold(
            session,
            HeldResource {
                lockspace: lockspace.to_string(),
                resource: resource.to_string(),
                disks: disks.to_vec(),
                geometry,
            },
        );
        info!(
            "{} acquired {}/{} as host {} generation {}",
            session, lockspace, resource, host_id, generation
        );
        Ok(())
    }

    /// Release a resource.
    ///
    /// With a session, only a resource acquired through that session can be
    /// released. The owner host id is cleared; the generation is kept as a
    /// record of the last holder.
    pub async fn release(
        &self,
        lockspace: &str,
        resource: &str,
        disks: &[DiskLocation],
        session: Option<Session>,
        opts: ResourceOptions,
    ) -> LkResult<()> {
        self.faults.check(Operation::Release)?;
        let geometry = opts.geometry()?;
        let mut state = self.state.write().await;
        state.lockspace(lockspace)?;
        let leader = match state
            .snapshot
            .store
            .load_mirrors(lockspace, resource, disks, geometry)
        {
            Ok(leader) => leader,
            Err(LkError::LeaderNotFound) => return Err(LkError::NotPermitted),
            Err(e) => return Err(e),
        };
        if !leader.acquired {
            return Err(LkError::NotPermitted);
        }
        if let Some(session) = session {
            if !self.sessions.holds(session, lockspace, resource) {
                return Err(LkError::NotPermitted);
            }
        }

        let mut next = state.snapshot.clone();
        next.store.store_mirrors(disks, &released(leader));
        self.commit(&mut state, next).await?;
        self.sessions.forget(lockspace, resource);
        info!("released {}/{}", lockspace, resource);
        Ok(())
    }

    // ─── Hosts and sessions ─────────────────────────────────────────────────

    /// Host records of a lockspace. `host_id` 0 lists every known host.
    pub async fn get_hosts(&self, lockspace: &str, host_id: HostId) -> LkResult<Vec<HostRecord>> {
        self.faults.check(Operation::GetHosts)?;
        let state = self.state.read().await;
        state.lockspace(lockspace)?;
        let hosts = state.snapshot.hosts.hosts(lockspace);
        if host_id == 0 {
            return Ok(hosts);
        }
        Ok(hosts.into_iter().filter(|h| h.id == host_id).collect())
    }

    /// Open a session through which resources are acquired.
    pub fn register(&self) -> LkResult<Session> {
        self.faults.check(Operation::Register)?;
        let session = self.sessions.register();
        debug!("registered {}", session);
        Ok(session)
    }

    /// Close a session, releasing every resource it still holds.
    pub async fn close(&self, session: Session) -> LkResult<()> {
        self.faults.check(Operation::Close)?;
        let mut state = self.state.write().await;
        let held = self.sessions.remove(session).ok_or(LkError::InvalidArgument)?;

        let mut next = state.snapshot.clone();
        let mut released_count = 0;
        for h in &held {
            match next
                .store
                .load_mirrors(&h.lockspace, &h.resource, &h.disks, h.geometry)
            {
                Ok(leader) if leader.acquired => {
                    next.store.store_mirrors(&h.disks, &released(leader));
                    released_count += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(
                    "{}: cannot release {}/{} on close: {}",
                    session, h.lockspace, h.resource, e
                ),
            }
        }
        if released_count > 0 {
            if let Err(e) = self.commit(&mut state, next).await {
                self.sessions.restore(session, held);
                return Err(e);
            }
        }
        info!("closed {}, released {} resource(s)", session, released_count);
        Ok(())
    }

    // ─── Failure injection ──────────────────────────────────────────────────

    /// Arm a failure for `op`. It fires before any state is consulted.
    pub fn inject_failure(&self, op: Operation, mode: FaultMode) {
        warn!("injecting {:?} failure into {}", mode, op);
        self.faults.arm(op, mode);
    }

    pub fn clear_failures(&self) {
        self.faults.clear();
    }
}

fn released(mut leader: ResourceLeader) -> ResourceLeader {
    leader.acquired = false;
    leader.host_id = 0;
    leader
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Backend whose saves can be switched to fail.
    #[derive(Default)]
    struct FlakyBackend {
        broken: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MetadataBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn load(&self) -> LkResult<Option<Snapshot>> {
            Ok(None)
        }

        async fn save(&self, _snapshot: &Snapshot) -> LkResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(LkError::Io);
            }
            Ok(())
        }
    }

    async fn flaky_manager() -> (LockManager, Arc<AtomicBool>) {
        let backend = FlakyBackend::default();
        let broken = backend.broken.clone();
        let lm = LockManager::open(ManagerConfig::default(), Box::new(backend))
            .await
            .unwrap();
        (lm, broken)
    }

    #[test]
    fn test_default_config() {
        assert_eq!(ManagerConfig::default().disk_sector, SectorSize::S512);
        assert_eq!(
            ManagerConfig::with_disk_sector(SectorSize::S4K).disk_sector,
            SectorSize::S4K
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_state() {
        let (lm, broken) = flaky_manager().await;
        lm.write_lockspace("ls", "/ids", LockspaceOptions::default())
            .await
            .unwrap();

        broken.store(true, Ordering::SeqCst);
        assert_eq!(
            lm.add_lockspace("ls", 1, "/ids", JoinOptions::default()).await,
            Err(LkError::Io)
        );
        assert_eq!(lm.lockspace_state("ls").await, LockspaceState::Persisted);
        assert!(lm.get_hosts("ls", 0).await.unwrap().is_empty());

        assert_eq!(
            lm.write_lockspace("other", "/ids2", LockspaceOptions::default())
                .await,
            Err(LkError::Io)
        );
        assert_eq!(lm.lockspace_state("other").await, LockspaceState::Absent);

        broken.store(false, Ordering::SeqCst);
        lm.add_lockspace("ls", 1, "/ids", JoinOptions::default())
            .await
            .unwrap();
        assert_eq!(lm.lockspace_state("ls").await, LockspaceState::Active);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_lease() {
        let (lm, broken) = flaky_manager().await;
        let disks = [DiskLocation::new("/leases", 0)];
        let opts = ResourceOptions::default();
        lm.write_lockspace("ls", "/ids", LockspaceOptions::default())
            .await
            .unwrap();
        lm.add_lockspace("ls", 1, "/ids", JoinOptions::default())
            .await
            .unwrap();
        lm.write_resource("ls", "r", &disks, opts).await.unwrap();
        let session = lm.register().unwrap();
        lm.acquire("ls", "r", &disks, session, opts).await.unwrap();

        broken.store(true, Ordering::SeqCst);
        assert_eq!(
            lm.release("ls", "r", &disks, Some(session), opts).await,
            Err(LkError::Io)
        );
        assert_eq!(lm.close(session).await, Err(LkError::Io));
        assert!(lm.read_resource(&disks[0], opts).await.unwrap().acquired);

        broken.store(false, Ordering::SeqCst);
        lm.close(session).await.unwrap();
        assert!(!lm.read_resource(&disks[0], opts).await.unwrap().acquired);
    }

    #[tokio::test]
    async fn test_add_rejects_host_id_out_of_range() {
        let lm = LockManager::new(ManagerConfig::default());
        let opts = LockspaceOptions {
            max_hosts: 4,
            ..Default::default()
        };
        lm.write_lockspace("ls", "/ids", opts).await.unwrap();
        assert_eq!(lm.read_lockspace("ls").await.unwrap().max_hosts, 4);

        for host_id in [0, 5] {
            assert_eq!(
                lm.add_lockspace("ls", host_id, "/ids", JoinOptions::default())
                    .await,
                Err(LkError::InvalidArgument)
            );
        }
        lm.add_lockspace("ls", 4, "/ids", JoinOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_max_hosts_limit() {
        let lm = LockManager::new(ManagerConfig::default());
        lm.write_lockspace("ls", "/ids", LockspaceOptions::default())
            .await
            .unwrap();
        assert_eq!(lm.read_lockspace("ls").await.unwrap().max_hosts, 2000);

        let opts = LockspaceOptions {
            max_hosts: 2001,
            ..Default::default()
        };
        assert_eq!(
            lm.write_lockspace("ls", "/ids", opts).await,
            Err(LkError::InvalidArgument)
        );
    }
}
