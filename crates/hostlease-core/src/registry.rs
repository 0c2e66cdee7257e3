//! Host registry.
//!
//! Tracks, per lockspace, every host that ever joined it together with
//! its fencing generation and liveness. A record is created on the first
//! join and never removed: leaving clears liveness, rejoining bumps the
//! generation. The generation therefore never repeats for a host, which
//! is what lets a stale lock holder be told apart from a current one.

use std::collections::BTreeMap;

use hostlease_proto::host::{HostFlags, HostId, HostRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegistry {
    spaces: BTreeMap<String, BTreeMap<HostId, HostRecord>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful join and return the host's new record.
    ///
    /// The first join starts at generation 0; every later join of the
    /// same host id gets the previous generation plus one.
    pub fn join(&mut self, lockspace: &str, host_id: HostId) -> HostRecord {
        let hosts = self.spaces.entry(lockspace.to_string()).or_default();
        let record = hosts
            .entry(host_id)
            .and_modify(|h| {
                h.generation += 1;
                h.flags = HostFlags::Live;
            })
            .or_insert(HostRecord {
                id: host_id,
                generation: 0,
                flags: HostFlags::Live,
            });
        *record
    }

    /// Clear liveness. The generation is kept for the next join.
    pub fn leave(&mut self, lockspace: &str, host_id: HostId) -> Option<HostRecord> {
        let record = self.spaces.get_mut(lockspace)?.get_mut(&host_id)?;
        record.flags = HostFlags::Free;
        Some(*record)
    }

    pub fn get(&self, lockspace: &str, host_id: HostId) -> Option<&HostRecord> {
        self.spaces.get(lockspace)?.get(&host_id)
    }

    /// All known hosts of a lockspace, ordered by id.
    pub fn hosts(&self, lockspace: &str) -> Vec<HostRecord> {
        self.spaces
            .get(lockspace)
            .map(|hosts| hosts.values().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any host ever joined the lockspace.
    pub fn knows_lockspace(&self, lockspace: &str) -> bool {
        self.spaces.get(lockspace).is_some_and(|hosts| !hosts.is_empty())
    }

    /// Whether a fencing token is still valid: the host is live and its
    /// current generation is the recorded one.
    pub fn is_current(&self, lockspace: &str, host_id: HostId, generation: u64) -> bool {
        self.get(lockspace, host_id)
            .is_some_and(|h| h.is_live() && h.generation == generation)
    }

    /// Mark every host free. Used after loading persisted state, since no
    /// lease survives a restart of the lock service.
    pub fn mark_all_free(&mut self) {
        for record in self.spaces.values_mut().flat_map(|hosts| hosts.values_mut()) {
            record.flags = HostFlags::Free;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_join_generation_zero() {
        let mut reg = HostRegistry::new();
        let rec = reg.join("ls", 1);
        assert_eq!(rec.id, 1);
        assert_eq!(rec.generation, 0);
        assert!(rec.is_live());
        assert!(reg.knows_lockspace("ls"));
        assert!(!reg.knows_lockspace("other"));
    }

    #[test]
    fn test_rejoin_bumps_generation() {
        let mut reg = HostRegistry::new();
        reg.join("ls", 1);
        let left = reg.leave("ls", 1).unwrap();
        assert_eq!(left.flags, HostFlags::Free);
        assert_eq!(left.generation, 0);

        for expected in 1..=3 {
            let rec = reg.join("ls", 1);
            assert_eq!(rec.generation, expected);
            reg.leave("ls", 1);
        }
    }

    #[test]
    fn test_generations_are_per_lockspace() {
        let mut reg = HostRegistry::new();
        reg.join("a", 1);
        reg.leave("a", 1);
        reg.join("a", 1);
        assert_eq!(reg.join("b", 1).generation, 0);
        assert_eq!(reg.get("a", 1).unwrap().generation, 1);
    }

    #[test]
    fn test_is_current() {
        let mut reg = HostRegistry::new();
        reg.join("ls", 1);
        assert!(reg.is_current("ls", 1, 0));
        reg.leave("ls", 1);
        assert!(!reg.is_current("ls", 1, 0));
        reg.join("ls", 1);
        assert!(!reg.is_current("ls", 1, 0));
        assert!(reg.is_current("ls", 1, 1));
    }

    #[test]
    fn test_hosts_ordered() {
        let mut reg = HostRegistry::new();
        reg.join("ls", 3);
        reg.join("ls", 1);
        let ids: Vec<_> = reg.hosts("ls").iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(reg.hosts("none").is_empty());
    }

    #[test]
    fn test_mark_all_free() {
        let mut reg = HostRegistry::new();
        reg.join("a", 1);
        reg.join("b", 2);
        reg.mark_all_free();
        assert!(reg.hosts("a").iter().chain(reg.hosts("b").iter()).all(|h| !h.is_live()));
        assert_eq!(reg.leave("a", 9), None);
    }
}
