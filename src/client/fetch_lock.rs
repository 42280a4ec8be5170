//! Per-repository locking for fetch operations
//!
//! Concurrent fetches of the same repository queue behind one async mutex, so
//! the second caller finds the history already stored instead of retrieving
//! it again. Fetches of different repositories never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub(crate) struct FetchLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl FetchLocks {
    /// Wait for exclusive access to `repo`
    pub(crate) async fn acquire(&self, repo: &str) -> FetchGuard {
        let lock = self.map().entry(repo.to_string()).or_default().clone();

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Fetch of {} already in progress, waiting", repo);
                lock.lock_owned().await
            }
        };

        FetchGuard {
            repo: repo.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of repositories with a fetch running or queued
    pub(crate) fn in_flight(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        // The map stays consistent even if a holder panicked
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive access to one repository; removes its map entry when the last
/// holder is gone
pub(crate) struct FetchGuard {
    repo: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&self.repo)
            && Arc::strong_count(lock) == 1
        {
            map.remove(&self.repo);
        }
    }
}
