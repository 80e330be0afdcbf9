//! Durable release store backed by one JSON document.
//!
//! Every mutation rewrites the whole document with the temp-then-rename
//! pattern:
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename over `<path>`
//! 4. fsync the parent directory
//!
//! Readers therefore see either the old or the new document, never a torn
//! write. The in-memory ledger is only replaced once the write succeeded.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Release, ReleaseLedger, ReleaseRecord, ReleaseStore, StoreError, StoreResult};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedReleases {
    schema_version: u32,
    #[serde(flatten)]
    ledger: ReleaseLedger,
}

#[derive(Debug)]
pub struct FileReleaseStore {
    path: PathBuf,
    ledger: Mutex<ReleaseLedger>,
}

impl FileReleaseStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let ledger = try_load(&path)?.unwrap_or_default();
        debug!(path = %path.display(), releases = ledger.len(), "opened release store");
        Ok(FileReleaseStore {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the ledger, persists the copy, and only
    /// then makes it current.
    async fn commit<T, F>(&self, change: F) -> StoreResult<T>
    where
        F: FnOnce(&mut ReleaseLedger) -> StoreResult<T>,
    {
        let mut guard = self.ledger.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;

        let path = self.path.clone();
        let doc = PersistedReleases {
            schema_version: SCHEMA_VERSION,
            ledger: next,
        };
        let doc = tokio::task::spawn_blocking(move || save_atomic(&path, &doc).map(|()| doc))
            .await??;

        *guard = doc.ledger;
        Ok(out)
    }
}

#[async_trait]
impl ReleaseStore for FileReleaseStore {
    async fn save(&self, release: Release) -> StoreResult<ReleaseRecord> {
        self.commit(|ledger| Ok(ledger.insert(release))).await
    }

    async fn get(&self, id: u64) -> StoreResult<Option<ReleaseRecord>> {
        Ok(self.ledger.lock().await.get(id).cloned())
    }

    async fn list(&self, environment: Option<&str>) -> StoreResult<Vec<ReleaseRecord>> {
        Ok(self.ledger.lock().await.list(environment))
    }

    async fn mark_viewed(&self, login: &str, id: u64) -> StoreResult<()> {
        self.commit(|ledger| ledger.mark_viewed(login, id).map(|_| ()))
            .await
    }

    async fn unviewed(&self, login: &str) -> StoreResult<Vec<ReleaseRecord>> {
        Ok(self.ledger.lock().await.unviewed(login))
    }
}

fn save_atomic(path: &Path, doc: &PersistedReleases) -> StoreResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(doc)?;
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fsync_dir(parent)?;
    }
    Ok(())
}

/// Makes a rename inside `dir` durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

fn load(path: &Path) -> StoreResult<ReleaseLedger> {
    let bytes = std::fs::read(path)?;
    let doc: PersistedReleases = serde_json::from_slice(&bytes)?;
    if doc.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: doc.schema_version,
        });
    }
    Ok(doc.ledger)
}

/// Like [`load`], but a missing file is `None` rather than an error.
fn try_load(path: &Path) -> StoreResult<Option<ReleaseLedger>> {
    match load(path) {
        Ok(ledger) => Ok(Some(ledger)),
        Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
