use crate::error::StoreError;
use crate::types::CommitRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// History of one repository as it was retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRepository {
    /// When the history was retrieved
    pub fetched_at: DateTime<Utc>,
    /// Name of the loader that produced it
    pub source: String,
    pub commits: Vec<CommitRecord>,
}

/// Retrieved histories keyed by repository name, persisted as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitStore {
    repos: BTreeMap<String, StoredRepository>,
}

impl CommitStore {
    /// Get the default store file path
    pub fn default_path() -> PathBuf {
        crate::paths::PlatformPaths::default_store_path()
    }

    /// Load the store from disk; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Self::read(path).map_err(|e| StoreError::LoadFailed {
            path: path.display().to_string(),
            reason: format!("{:#}", e),
        })
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Store file {:?} not found, starting with empty store", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read store file")?;
        let store: CommitStore =
            serde_json::from_str(&content).context("Failed to parse store file")?;

        tracing::info!(
            "Loaded store with {} repositories ({} commits)",
            store.repos.len(),
            store.total_commits()
        );
        Ok(store)
    }

    /// Save the store to disk, replacing whatever the file holds
    ///
    /// Writers are serialized through an exclusive lock on `<path>.lock` and
    /// the file is replaced atomically.
    pub fn save(&self, path: &Path, lock_timeout: Duration) -> Result<(), StoreError> {
        let _lock = lock_store(path, lock_timeout)?;
        self.write(path).map_err(|e| save_failed(path, e))
    }

    /// Apply `change` to the current on-disk store and write it back
    ///
    /// The lock is held from the read to the write, so concurrent writers in
    /// other processes never drop each other's repositories. Returns the
    /// updated store together with the value `change` produced. This blocks
    /// while waiting for the lock; async callers run it on a blocking thread.
    pub fn update<T>(
        path: &Path,
        lock_timeout: Duration,
        change: impl FnOnce(&mut CommitStore) -> T,
    ) -> Result<(Self, T), StoreError> {
        let _lock = lock_store(path, lock_timeout)?;
        let mut store = Self::load(path)?;
        let value = change(&mut store);
        store.write(path).map_err(|e| save_failed(path, e))?;
        Ok((store, value))
    }

    fn write(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).context("Failed to create store directory")?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize store")?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temporary store file")?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write store file")?;
        tmp.persist(path).context("Failed to replace store file")?;

        tracing::debug!("Saved store to {:?}", path);
        Ok(())
    }

    /// Check whether a repository has a stored history
    pub fn contains(&self, repo: &str) -> bool {
        self.repos.contains_key(repo)
    }

    pub fn get(&self, repo: &str) -> Option<&StoredRepository> {
        self.repos.get(repo)
    }

    /// Stored commits of a repository, newest first
    pub fn commits(&self, repo: &str) -> Option<&[CommitRecord]> {
        self.repos.get(repo).map(|r| r.commits.as_slice())
    }

    /// Store (or replace) the history of a repository
    pub fn insert(
        &mut self,
        repo: impl Into<String>,
        source: impl Into<String>,
        commits: Vec<CommitRecord>,
    ) {
        self.repos.insert(
            repo.into(),
            StoredRepository {
                fetched_at: Utc::now(),
                source: source.into(),
                commits,
            },
        );
    }

    pub fn remove(&mut self, repo: &str) -> bool {
        self.repos.remove(repo).is_some()
    }

    /// Names of all stored repositories, sorted
    pub fn repositories(&self) -> Vec<String> {
        self.repos.keys().cloned().collect()
    }

    pub fn total_commits(&self) -> usize {
        self.repos.values().map(|r| r.commits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

fn save_failed(path: &Path, err: anyhow::Error) -> StoreError {
    StoreError::SaveFailed {
        path: path.display().to_string(),
        reason: format!("{:#}", err),
    }
}

/// Lock file guarding writes to `path`; released when the file is dropped
///
/// Polls a non-blocking lock until `timeout` expires.
fn lock_store(path: &Path, timeout: Duration) -> Result<File, StoreError> {
    let lock_path = lock_path(path);
    let lock_err = |reason: String| StoreError::LockFailed {
        path: lock_path.display().to_string(),
        reason,
    };

    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| lock_err(e.to_string()))?;
    }

    let file = File::create(&lock_path).map_err(|e| lock_err(e.to_string()))?;
    let start = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(
                    "Acquired store lock {:?} after {:?}",
                    lock_path,
                    start.elapsed()
                );
                return Ok(file);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    return Err(lock_err(format!(
                        "held by another writer for more than {:?}",
                        timeout
                    )));
                }
                tracing::trace!("Store lock {:?} busy, retrying", lock_path);
                std::thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(e) => return Err(lock_err(e.to_string())),
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
