//! Lockspace membership and pending join/leave tickets.
//!
//! A real lock service joins and leaves lockspaces in the background
//! while it performs I/O on the delta leases. Here a pending operation is
//! a ticket that stays open until `complete` is called for the
//! lockspace. Each lockspace owns one completion counter (a `watch`
//! channel) that is bumped, waking every waiter, whenever a ticket
//! completes. A waiter records the counter while the ticket it waits for
//! is open and resumes once the counter moves past it, so a ticket that
//! opens right after the completion cannot hide it. Only one ticket per
//! lockspace can be open at a time.

use hostlease_proto::error::{LkError, LkResult};
use hostlease_proto::host::HostId;
use hostlease_proto::lockspace::LockspaceState;
use tokio::sync::watch;

/// The kind of a pending membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Join,
    Leave,
}

/// An open join or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: TicketKind,
    pub host_id: HostId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending(Ticket),
    Active(HostId),
}

/// Membership of this host in one lockspace.
#[derive(Debug)]
pub struct Membership {
    phase: Phase,
    /// I/O timeout requested by the last join
    iotimeout: u32,
    /// Number of tickets completed so far
    completed: watch::Sender<u64>,
}

impl Default for Membership {
    fn default() -> Self {
        Self::new()
    }
}

impl Membership {
    pub fn new() -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            phase: Phase::Idle,
            iotimeout: 0,
            completed,
        }
    }

    pub fn state(&self) -> LockspaceState {
        match self.phase {
            Phase::Idle => LockspaceState::Persisted,
            Phase::Pending(Ticket { kind: TicketKind::Join, .. }) => LockspaceState::Joining,
            Phase::Pending(Ticket { kind: TicketKind::Leave, .. }) => LockspaceState::Leaving,
            Phase::Active(_) => LockspaceState::Active,
        }
    }

    /// The host that holds, is acquiring, or is releasing the lease.
    pub fn host_id(&self) -> Option<HostId> {
        match self.phase {
            Phase::Idle => None,
            Phase::Pending(ticket) => Some(ticket.host_id),
            Phase::Active(host_id) => Some(host_id),
        }
    }

    /// The active host, if the join completed.
    pub fn active_host(&self) -> Option<HostId> {
        match self.phase {
            Phase::Active(host_id) => Some(host_id),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<Ticket> {
        match self.phase {
            Phase::Pending(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn iotimeout(&self) -> u32 {
        self.iotimeout
    }

    /// No ticket is open.
    pub fn is_ready(&self) -> bool {
        self.pending().is_none()
    }

    pub fn completions(&self) -> u64 {
        *self.completed.borrow()
    }

    /// Open a join ticket. The lockspace must be idle.
    pub fn begin_join(&mut self, host_id: HostId, iotimeout: u32) -> LkResult<()> {
        if self.phase != Phase::Idle {
            return Err(LkError::Exists);
        }
        self.iotimeout = iotimeout;
        self.open(Ticket {
            kind: TicketKind::Join,
            host_id,
        });
        Ok(())
    }

    /// Open a leave ticket. The lockspace must be active for `host_id`.
    pub fn begin_leave(&mut self, host_id: HostId) -> LkResult<()> {
        if self.active_host() != Some(host_id) {
            return Err(LkError::NotPermitted);
        }
        self.open(Ticket {
            kind: TicketKind::Leave,
            host_id,
        });
        Ok(())
    }

    fn open(&mut self, ticket: Ticket) {
        self.phase = Phase::Pending(ticket);
    }

    /// Complete the open ticket and wake every waiter.
    pub fn complete(&mut self) -> LkResult<Ticket> {
        let ticket = self.pending().ok_or(LkError::NotPermitted)?;
        self.phase = match ticket.kind {
            TicketKind::Join => Phase::Active(ticket.host_id),
            TicketKind::Leave => Phase::Idle,
        };
        self.completed.send_modify(|n| *n += 1);
        Ok(ticket)
    }

    /// Synchronous join: idle to active without a ticket.
    pub fn activate(&mut self, host_id: HostId, iotimeout: u32) -> LkResult<()> {
        if self.phase != Phase::Idle {
            return Err(LkError::Exists);
        }
        self.iotimeout = iotimeout;
        self.phase = Phase::Active(host_id);
        Ok(())
    }

    /// Synchronous leave: active to idle.
    pub fn deactivate(&mut self, host_id: HostId) -> LkResult<()> {
        if self.active_host() != Some(host_id) {
            return Err(LkError::NotPermitted);
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Wait handle for the completion of the ticket open now.
    ///
    /// Take it while holding the lock that guards this membership, then
    /// release the lock and wait: any completion after this call releases
    /// the waiter, whatever tickets open afterwards.
    pub fn waiter(&self) -> Waiter {
        Waiter {
            rx: self.completed.subscribe(),
            seen: self.completions(),
        }
    }

    /// Non-blocking inquiry: `Some(true)` when active, `Some(false)` when
    /// idle, `None` while a ticket is open.
    pub fn inquire(&self) -> Option<bool> {
        match self.phase {
            Phase::Idle => Some(false),
            Phase::Pending(_) => None,
            Phase::Active(_) => Some(true),
        }
    }
}

/// A caller blocked on the next ticket completion of one lockspace.
#[derive(Debug)]
pub struct Waiter {
    rx: watch::Receiver<u64>,
    seen: u64,
}

impl Waiter {
    /// Resolve once a ticket completes after the handle was taken.
    pub async fn wait(mut self) -> LkResult<()> {
        let seen = self.seen;
        self.rx
            .wait_for(|n| *n > seen)
            .await
            .map(|_| ())
            .map_err(|_| LkError::NoSpace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sync_cycle() {
        let mut m = Membership::new();
        assert_eq!(m.state(), LockspaceState::Persisted);
        assert_eq!(m.inquire(), Some(false));

        m.activate(1, 10).unwrap();
        assert_eq!(m.state(), LockspaceState::Active);
        assert_eq!(m.inquire(), Some(true));
        assert_eq!(m.iotimeout(), 10);
        assert!(m.is_ready());

        assert_eq!(m.activate(1, 0), Err(LkError::Exists));
        assert_eq!(m.deactivate(2), Err(LkError::NotPermitted));
        m.deactivate(1).unwrap();
        assert_eq!(m.state(), LockspaceState::Persisted);
    }

    #[test]
    fn test_async_join_ticket() {
        let mut m = Membership::new();
        m.begin_join(1, 0).unwrap();
        assert_eq!(m.state(), LockspaceState::Joining);
        assert_eq!(m.inquire(), None);
        assert!(!m.is_ready());
        assert_eq!(m.begin_join(1, 0), Err(LkError::Exists));

        let ticket = m.complete().unwrap();
        assert_eq!(ticket.kind, TicketKind::Join);
        assert_eq!(m.active_host(), Some(1));
        assert!(m.is_ready());
        assert_eq!(m.complete(), Err(LkError::NotPermitted));
    }

    #[test]
    fn test_async_leave_ticket() {
        let mut m = Membership::new();
        m.activate(1, 0).unwrap();
        assert_eq!(m.begin_leave(2), Err(LkError::NotPermitted));
        m.begin_leave(1).unwrap();
        assert_eq!(m.state(), LockspaceState::Leaving);
        assert_eq!(m.host_id(), Some(1));
        assert_eq!(m.active_host(), None);

        assert_eq!(m.complete().unwrap().kind, TicketKind::Leave);
        assert_eq!(m.state(), LockspaceState::Persisted);
        assert_eq!(m.host_id(), None);
    }

    #[tokio::test]
    async fn test_waiter_released_on_complete() {
        let mut m = Membership::new();
        m.begin_join(1, 0).unwrap();
        let waiting = tokio::spawn(m.waiter().wait());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        m.complete().unwrap();
        waiting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_waiter_subscribed_before_complete_sees_it() {
        let mut m = Membership::new();
        m.begin_join(1, 0).unwrap();
        let waiter = m.waiter();
        m.complete().unwrap();
        waiter.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_waiter_not_hidden_by_next_ticket() {
        let mut m = Membership::new();
        m.begin_join(1, 0).unwrap();
        let waiter = m.waiter();

        m.complete().unwrap();
        m.begin_leave(1).unwrap();
        assert_eq!(m.completions(), 1);
        tokio::time::timeout(Duration::from_millis(500), waiter.wait())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiter_ignores_earlier_completions() {
        let mut m = Membership::new();
        m.begin_join(1, 0).unwrap();
        m.complete().unwrap();
        m.begin_leave(1).unwrap();

        let waiting = tokio::spawn(m.waiter().wait());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        m.complete().unwrap();
        waiting.await.unwrap().unwrap();
    }
}
