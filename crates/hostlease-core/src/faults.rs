//! Failure injection for exercising caller error paths.

use dashmap::DashMap;
use hostlease_proto::error::{LkError, LkResult};
use hostlease_proto::op::Operation;
use tracing::debug;

/// How long an injected failure stays armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Fail the next call only.
    Once,
    /// Fail every call until cleared.
    Always,
}

#[derive(Default)]
pub struct FailureInjector {
    armed: DashMap<Operation, FaultMode>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, op: Operation, mode: FaultMode) {
        self.armed.insert(op, mode);
    }

    pub fn disarm(&self, op: Operation) {
        self.armed.remove(&op);
    }

    pub fn clear(&self) {
        self.armed.clear();
    }

    /// Fail with `Injected(op)` if a fault is armed for `op`.
    pub fn check(&self, op: Operation) -> LkResult<()> {
        let fired = self
            .armed
            .remove_if(&op, |_, mode| *mode == FaultMode::Once)
            .is_some()
            || self.armed.contains_key(&op);
        if fired {
            debug!("injected failure in {}", op);
            return Err(LkError::Injected(op));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_armed() {
        let faults = FailureInjector::new();
        assert!(faults.check(Operation::Acquire).is_ok());
    }

    #[test]
    fn test_once() {
        let faults = FailureInjector::new();
        faults.arm(Operation::Acquire, FaultMode::Once);
        assert_eq!(
            faults.check(Operation::Acquire),
            Err(LkError::Injected(Operation::Acquire))
        );
        assert!(faults.check(Operation::Acquire).is_ok());
    }

    #[test]
    fn test_always_until_cleared() {
        let faults = FailureInjector::new();
        faults.arm(Operation::Release, FaultMode::Always);
        assert!(faults.check(Operation::Release).is_err());
        assert!(faults.check(Operation::Release).is_err());
        assert!(faults.check(Operation::Acquire).is_ok());
        faults.clear();
        assert!(faults.check(Operation::Release).is_ok());
    }

    #[test]
    fn test_disarm() {
        let faults = FailureInjector::new();
        faults.arm(Operation::Register, FaultMode::Always);
        faults.disarm(Operation::Register);
        assert!(faults.check(Operation::Register).is_ok());
    }
}
