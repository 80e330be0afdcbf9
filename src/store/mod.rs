//! Release records.
//!
//! One [`Release`] is written per merged PR that deploys to an environment.
//! Records are immutable once saved. The store also tracks which users have
//! viewed which releases, for the unviewed-releases API.
//!
//! Two backends share one [`ReleaseLedger`]:
//! - [`MemoryReleaseStore`] for tests and throwaway deployments
//! - [`FileReleaseStore`], a single JSON document rewritten atomically

pub mod file;
pub mod memory;

pub use file::FileReleaseStore;
pub use memory::MemoryReleaseStore;

use std::collections::{BTreeSet, HashMap};
use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notes::ReleaseNote;
use crate::types::{PrNumber, RepoId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("release {0} does not exist")]
    NotFound(u64),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The PR a release came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSummary {
    pub pr_number: PrNumber,
    pub repo_owner: String,
    pub repo_name: String,
}

impl PullRequestSummary {
    pub fn new(repo: &RepoId, pr_number: PrNumber) -> Self {
        PullRequestSummary {
            pr_number,
            repo_owner: repo.owner.clone(),
            repo_name: repo.repo.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub created_at: DateTime<Utc>,
    pub environment: String,
    pub release_notes: Vec<ReleaseNote>,
    pub pull_request: PullRequestSummary,
}

/// A saved release with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: u64,
    #[serde(flatten)]
    pub release: Release,
}

/// Durable home for releases and view marks.
///
/// Listings are newest first.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Assigns the next id and stores the release.
    async fn save(&self, release: Release) -> StoreResult<ReleaseRecord>;

    async fn get(&self, id: u64) -> StoreResult<Option<ReleaseRecord>>;

    /// All releases, or only those for one environment.
    async fn list(&self, environment: Option<&str>) -> StoreResult<Vec<ReleaseRecord>>;

    /// Records that `login` has seen release `id`. Idempotent.
    async fn mark_viewed(&self, login: &str, id: u64) -> StoreResult<()>;

    /// Releases `login` has not marked viewed.
    async fn unviewed(&self, login: &str) -> StoreResult<Vec<ReleaseRecord>>;
}

/// In-memory state behind both store backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLedger {
    next_id: u64,
    releases: Vec<ReleaseRecord>,
    /// Viewed release ids per lowercased login.
    views: HashMap<String, BTreeSet<u64>>,
}

impl ReleaseLedger {
    pub fn insert(&mut self, release: Release) -> ReleaseRecord {
        self.next_id += 1;
        let record = ReleaseRecord {
            id: self.next_id,
            release,
        };
        self.releases.push(record.clone());
        record
    }

    pub fn get(&self, id: u64) -> Option<&ReleaseRecord> {
        self.releases.iter().find(|r| r.id == id)
    }

    pub fn list(&self, environment: Option<&str>) -> Vec<ReleaseRecord> {
        self.releases
            .iter()
            .rev()
            .filter(|r| environment.is_none_or(|env| r.release.environment == env))
            .cloned()
            .collect()
    }

    /// Returns `Ok(true)` when the mark is new.
    pub fn mark_viewed(&mut self, login: &str, id: u64) -> StoreResult<bool> {
        if self.get(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        Ok(self
            .views
            .entry(login.to_lowercase())
            .or_default()
            .insert(id))
    }

    pub fn unviewed(&self, login: &str) -> Vec<ReleaseRecord> {
        let seen = self.views.get(&login.to_lowercase());
        self.releases
            .iter()
            .rev()
            .filter(|r| seen.is_none_or(|ids| !ids.contains(&r.id)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}
