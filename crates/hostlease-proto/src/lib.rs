//! # hostlease-proto
//!
//! Data types, constants and error codes for the hostlease disk-lease
//! lock manager.
//!
//! This crate defines the lockspace, host and resource records kept on
//! shared storage, the alignment/sector policy applied to them, and the
//! error taxonomy shared by the manager and its tools.

pub mod constants;
pub mod defaults;
pub mod error;
pub mod geometry;
pub mod host;
pub mod lockspace;
pub mod op;
pub mod resource;

// Re-export commonly used types at the crate root
pub use error::{LkError, LkResult};
pub use geometry::{Alignment, Geometry, SectorSize};
pub use host::{HostFlags, HostId, HostRecord};
pub use lockspace::{JoinOptions, LockspaceInfo, LockspaceOptions, LockspaceState, Mode};
pub use op::Operation;
pub use resource::{DiskLocation, Owner, ResourceLeader, ResourceOptions, Session};
