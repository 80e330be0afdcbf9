//! Per-PR caches keyed by PR id, with the head commit as validity token.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::{PrId, Sha};

/// Remembers one value per PR for as long as the head commit is unchanged.
///
/// Entries are never keyed by branch name: two PRs from the same branch must
/// not share an entry, and a force-push invalidates through the commit id.
#[derive(Debug)]
pub struct PrCache<T> {
    entries: Mutex<HashMap<PrId, (Sha, Arc<T>)>>,
}

impl<T> Default for PrCache<T> {
    fn default() -> Self {
        PrCache {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PrCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value if it was stored for `sha`.
    pub async fn get(&self, pr: PrId, sha: &Sha) -> Option<Arc<T>> {
        let entries = self.entries.lock().await;
        entries
            .get(&pr)
            .filter(|(cached_sha, _)| cached_sha == sha)
            .map(|(_, value)| Arc::clone(value))
    }

    /// Stores `value` for `pr` at `sha`, replacing any older entry.
    pub async fn insert(&self, pr: PrId, sha: Sha, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries
            .lock()
            .await
            .insert(pr, (sha, Arc::clone(&value)));
        value
    }

    pub async fn remove(&self, pr: PrId) {
        self.entries.lock().await.remove(&pr);
    }

    pub async fn contains(&self, pr: PrId) -> bool {
        self.entries.lock().await.contains_key(&pr)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_requires_matching_sha() {
        let cache = PrCache::new();
        cache.insert(PrId(1), Sha::new("aaa"), "value").await;

        assert_eq!(cache.get(PrId(1), &Sha::new("aaa")).await.as_deref(), Some(&"value"));
        assert!(cache.get(PrId(1), &Sha::new("bbb")).await.is_none());
        assert!(cache.get(PrId(2), &Sha::new("aaa")).await.is_none());
    }

    #[tokio::test]
    async fn insert_replaces_stale_entry() {
        let cache = PrCache::new();
        cache.insert(PrId(1), Sha::new("aaa"), 1).await;
        cache.insert(PrId(1), Sha::new("bbb"), 2).await;

        assert!(cache.get(PrId(1), &Sha::new("aaa")).await.is_none());
        assert_eq!(cache.get(PrId(1), &Sha::new("bbb")).await.as_deref(), Some(&2));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn remove_clears_entry() {
        let cache = PrCache::new();
        cache.insert(PrId(7), Sha::new("aaa"), ()).await;
        assert!(cache.contains(PrId(7)).await);
        cache.remove(PrId(7)).await;
        assert!(!cache.contains(PrId(7)).await);
    }
}
