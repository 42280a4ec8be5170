//! Library client for commit-viewer
//!
//! Combines the loader chain with the persistent store: histories are
//! retrieved once per repository and served from the store afterwards.

mod fetch_lock;

use crate::config::Config;
use crate::error::{ValidationError, ViewerError};
use crate::loader::CommitLoader;
use crate::retriever::CommitRetriever;
use crate::store::{CommitStore, StoredRepository};
use crate::types::{CommitRecord, RetrievalResult};
use fetch_lock::FetchLocks;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// What a fetch did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FetchOutcome {
    /// The history was already stored; nothing was retrieved
    Cached { count: usize },
    /// The history was retrieved through `source` and stored
    Fetched { source: String, count: usize },
}

impl FetchOutcome {
    pub fn count(&self) -> usize {
        match self {
            FetchOutcome::Cached { count } | FetchOutcome::Fetched { count, .. } => *count,
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Cached { count } => write!(f, "{} commits already stored", count),
            FetchOutcome::Fetched { source, count } => {
                write!(f, "Fetched {} commits via {}", count, source)
            }
        }
    }
}

/// Main client for retrieving and listing commit histories
///
/// # Example
///
/// ```no_run
/// use commit_viewer::{CommitViewerClient, Config};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut config = Config::default();
///     config.api.per_page = 50;
///
///     let client = CommitViewerClient::with_config(config)?;
///     client.fetch("diogo-aos/OOP").await?;
///     for commit in client.list("diogo-aos/OOP").await.unwrap_or_default() {
///         println!("{commit}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CommitViewerClient {
    pub(crate) config: Arc<Config>,
    pub(crate) retriever: Arc<CommitRetriever>,
    pub(crate) store: Arc<RwLock<CommitStore>>,
    pub(crate) store_path: PathBuf,
    pub(crate) fetch_locks: FetchLocks,
}

impl CommitViewerClient {
    /// Create a client from the config file plus environment overrides
    pub fn new() -> Result<Self, ViewerError> {
        let config = Config::new()?;
        Self::with_config(config)
    }

    /// Create a client with the standard loader chain (API, then clone)
    pub fn with_config(config: Config) -> Result<Self, ViewerError> {
        let retriever = CommitRetriever::from_config(&config)?;
        Self::with_retriever(config, retriever)
    }

    /// Create a client over a custom loader chain
    pub fn with_loaders(
        config: Config,
        loaders: Vec<Arc<dyn CommitLoader>>,
    ) -> Result<Self, ViewerError> {
        let retriever = CommitRetriever::new(loaders, config.retrieval.empty_history);
        Self::with_retriever(config, retriever)
    }

    fn with_retriever(config: Config, retriever: CommitRetriever) -> Result<Self, ViewerError> {
        let store_path = config.store.path.clone();
        let store = CommitStore::load(&store_path)?;

        tracing::info!(
            "Commit viewer ready: loaders={:?}, empty history={}, store={:?}",
            retriever.loader_names(),
            retriever.empty_history(),
            store_path
        );

        Ok(Self {
            config: Arc::new(config),
            retriever: Arc::new(retriever),
            store: Arc::new(RwLock::new(store)),
            store_path,
            fetch_locks: FetchLocks::default(),
        })
    }

    /// Retrieve and store the history of `repo` unless it is already stored
    pub async fn fetch(&self, repo: &str) -> Result<FetchOutcome, ViewerError> {
        self.fetch_with(repo, false).await
    }

    /// Retrieve the history of `repo` again, replacing any stored copy
    pub async fn refresh(&self, repo: &str) -> Result<FetchOutcome, ViewerError> {
        self.fetch_with(repo, true).await
    }

    async fn fetch_with(&self, repo: &str, force: bool) -> Result<FetchOutcome, ViewerError> {
        Self::validate_repository(repo)?;

        let _guard = self.fetch_locks.acquire(repo).await;

        if !force && let Some(count) = self.store.read().await.commits(repo).map(|c| c.len()) {
            tracing::info!("{} already stored ({} commits), skipping retrieval", repo, count);
            return Ok(FetchOutcome::Cached { count });
        }

        let start = Instant::now();
        let (source, commits) = match self.retriever.retrieve(repo).await {
            RetrievalResult::Success { source, commits } => (source, commits),
            RetrievalResult::Failure(failure) => {
                return Err(ViewerError::RetrievalFailed {
                    repo: repo.to_string(),
                    reason: failure.summary(),
                });
            }
        };
        let count = commits.len();

        let key = repo.to_string();
        let stored_source = source.clone();
        self.update_store(move |store| store.insert(key, stored_source, commits))
            .await?;

        tracing::info!(
            "Stored {} commits for {} via {} in {} ms",
            count,
            repo,
            source,
            start.elapsed().as_millis()
        );
        Ok(FetchOutcome::Fetched { source, count })
    }

    /// Stored commits of `repo`, newest first
    pub async fn list(&self, repo: &str) -> Option<Vec<CommitRecord>> {
        self.store.read().await.commits(repo).map(<[_]>::to_vec)
    }

    /// Stored entry of `repo`, including when and how it was retrieved
    pub async fn stored(&self, repo: &str) -> Option<StoredRepository> {
        self.store.read().await.get(repo).cloned()
    }

    /// Names of all stored repositories, sorted
    pub async fn repositories(&self) -> Vec<String> {
        self.store.read().await.repositories()
    }

    /// Remove the stored history of `repo`, returning whether it existed
    pub async fn forget(&self, repo: &str) -> Result<bool, ViewerError> {
        let _guard = self.fetch_locks.acquire(repo).await;

        let key = repo.to_string();
        let removed = self.update_store(move |store| store.remove(&key)).await?;
        if removed {
            tracing::info!("Forgot stored history of {}", repo);
        }
        Ok(removed)
    }

    /// Apply `change` to the store file and adopt the result in memory
    ///
    /// The file is re-read under its lock, so repositories written by other
    /// processes since this client loaded the store are kept. The in-memory
    /// copy changes only after a successful write.
    async fn update_store<T: Send + 'static>(
        &self,
        change: impl FnOnce(&mut CommitStore) -> T + Send + 'static,
    ) -> Result<T, ViewerError> {
        // Held across the write so swaps land in write order
        let mut store = self.store.write().await;

        let path = self.store_path.clone();
        let lock_timeout = Duration::from_secs(self.config.store.lock_timeout_secs);
        let (updated, value) =
            tokio::task::spawn_blocking(move || CommitStore::update(&path, lock_timeout, change))
                .await
                .map_err(|e| ViewerError::Other(format!("Store update task failed: {}", e)))??;

        *store = updated;
        Ok(value)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Repository names are opaque, but must not be blank
    pub fn validate_repository(repo: &str) -> Result<(), ValidationError> {
        if repo.trim().is_empty() {
            return Err(ValidationError::Empty("repository name".to_string()));
        }
        Ok(())
    }
}
