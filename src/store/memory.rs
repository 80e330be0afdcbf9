//! Volatile release store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Release, ReleaseLedger, ReleaseRecord, ReleaseStore, StoreResult};

/// Keeps everything in process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    ledger: Mutex<ReleaseLedger>,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn save(&self, release: Release) -> StoreResult<ReleaseRecord> {
        Ok(self.ledger.lock().await.insert(release))
    }

    async fn get(&self, id: u64) -> StoreResult<Option<ReleaseRecord>> {
        Ok(self.ledger.lock().await.get(id).cloned())
    }

    async fn list(&self, environment: Option<&str>) -> StoreResult<Vec<ReleaseRecord>> {
        Ok(self.ledger.lock().await.list(environment))
    }

    async fn mark_viewed(&self, login: &str, id: u64) -> StoreResult<()> {
        self.ledger.lock().await.mark_viewed(login, id)?;
        Ok(())
    }

    async fn unviewed(&self, login: &str) -> StoreResult<Vec<ReleaseRecord>> {
        Ok(self.ledger.lock().await.unviewed(login))
    }
}
