//! In-memory backend. Saves are dropped.

use async_trait::async_trait;
use hostlease_proto::error::LkResult;

use super::{MetadataBackend, Snapshot};

#[derive(Debug, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> LkResult<Option<Snapshot>> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &Snapshot) -> LkResult<()> {
        Ok(())
    }
}
