//! Disk-lease lock manager.
//!
//! Lockspaces give hosts a fenced membership; resources are exclusive
//! locks taken by an active member and stamped with its generation.
//! `LockManager` is the entry point; everything else is the state it is
//! built from.

pub mod backend;
pub mod faults;
pub mod manager;
pub mod registry;
pub mod session;
pub mod store;
pub mod ticket;

pub use backend::{FileBackend, MemoryBackend, MetadataBackend, Snapshot};
pub use faults::FaultMode;
pub use manager::{LockManager, ManagerConfig};
