//! Registered client sessions and the resources held through them.
//!
//! A real lock service ties every lease to the client connection and
//! drops the leases when the connection goes away. That process-lifetime
//! tracking is left to the caller: `LockManager::close` releases whatever
//! a session still holds, and callers wire it into their own shutdown
//! handling.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use hostlease_proto::defaults::FIRST_SESSION_ID;
use hostlease_proto::geometry::Geometry;
use hostlease_proto::resource::{DiskLocation, Session};

/// A resource acquired through a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldResource {
    pub lockspace: String,
    pub resource: String,
    pub disks: Vec<DiskLocation>,
    pub geometry: Geometry,
}

impl HeldResource {
    fn is(&self, lockspace: &str, resource: &str) -> bool {
        self.lockspace == lockspace && self.resource == resource
    }
}

/// Table of live sessions, keyed by handle.
pub struct SessionTable {
    next: AtomicU64,
    held: DashMap<Session, Vec<HeldResource>>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(FIRST_SESSION_ID),
            held: DashMap::new(),
        }
    }

    /// Allocate a new session handle.
    pub fn register(&self) -> Session {
        let session = Session(self.next.fetch_add(1, Ordering::Relaxed));
        self.held.insert(session, Vec::new());
        session
    }

    pub fn contains(&self, session: Session) -> bool {
        self.held.contains_key(&session)
    }

    /// Record a resource acquired through `session`.
    pub fn hold(&self, session: Session, held: HeldResource) {
        if let Some(mut entry) = self.held.get_mut(&session) {
            entry.push(held);
        }
    }

    /// Whether `session` holds the named resource.
    pub fn holds(&self, session: Session, lockspace: &str, resource: &str) -> bool {
        self.held
            .get(&session)
            .is_some_and(|entry| entry.iter().any(|h| h.is(lockspace, resource)))
    }

    /// Forget the named resource in whichever session holds it.
    pub fn forget(&self, lockspace: &str, resource: &str) {
        for mut entry in self.held.iter_mut() {
            entry.retain(|h| !h.is(lockspace, resource));
        }
    }

    /// Remove a session, returning what it still held.
    pub fn remove(&self, session: Session) -> Option<Vec<HeldResource>> {
        self.held.remove(&session).map(|(_, held)| held)
    }

    /// Put back a session taken out by `remove`.
    pub fn restore(&self, session: Session, held: Vec<HeldResource>) {
        self.held.insert(session, held);
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(resource: &str) -> HeldResource {
        HeldResource {
            lockspace: "ls".to_string(),
            resource: resource.to_string(),
            disks: vec![DiskLocation::new("path", 0)],
            geometry: Geometry::default(),
        }
    }

    #[test]
    fn test_register_unique() {
        let table = SessionTable::new();
        let a = table.register();
        let b = table.register();
        assert_ne!(a, b);
        assert_eq!(a, Session(FIRST_SESSION_ID));
        assert!(table.contains(a));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_hold_and_forget() {
        let table = SessionTable::new();
        let s = table.register();
        table.hold(s, held("r1"));
        table.hold(s, held("r2"));
        assert!(table.holds(s, "ls", "r1"));

        table.forget("ls", "r1");
        assert!(!table.holds(s, "ls", "r1"));
        assert!(table.holds(s, "ls", "r2"));
    }

    #[test]
    fn test_remove_returns_held() {
        let table = SessionTable::new();
        let s = table.register();
        table.hold(s, held("r1"));
        assert_eq!(table.remove(s), Some(vec![held("r1")]));
        assert!(!table.contains(s));
        assert_eq!(table.remove(s), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_hold_unknown_session_ignored() {
        let table = SessionTable::new();
        table.hold(Session(999), held("r1"));
        assert!(!table.holds(Session(999), "ls", "r1"));
    }
}
