//! Persistence backends for lock metadata.
//!
//! The `MetadataBackend` trait defines where the manager's durable state
//! (lockspace records, resource leaders and the host registry) lives.
//! The manager saves a full snapshot after every mutation, while still
//! holding its state lock, and loads it once on open.
//!
//! Available backends:
//! - **memory**: nothing is persisted; state lives as long as the manager.
//! - **file**: bincode snapshot in a state directory, replaced atomically.

use async_trait::async_trait;
use hostlease_proto::error::LkResult;
use serde::{Deserialize, Serialize};

use crate::registry::HostRegistry;
use crate::store::MetadataStore;

/// The durable part of the lock manager state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub store: MetadataStore,
    pub hosts: HostRegistry,
}

/// Trait that all persistence backends must implement.
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "memory", "file").
    fn name(&self) -> &str;

    /// Load the last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> LkResult<Option<Snapshot>>;

    /// Durably replace the saved snapshot.
    async fn save(&self, snapshot: &Snapshot) -> LkResult<()>;
}

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;
