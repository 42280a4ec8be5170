//! Loader chain orchestration
//!
//! Tries each loader once, in order, and returns the first acceptable history.
//! Loader errors never escape: they are logged, recorded in the failure
//! envelope and turned into "try the next loader".

use crate::config::Config;
use crate::error::LoadResult;
use crate::loader::{CommitLoader, LocalCloneLoader, RemoteApiLoader};
use crate::types::{LoaderAttempt, RetrievalFailure, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How an empty but successful load is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyHistoryPolicy {
    /// Count an empty history as a failed attempt and try the next loader
    #[default]
    Fallback,
    /// Return `Success` with no commits
    Accept,
}

impl FromStr for EmptyHistoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(EmptyHistoryPolicy::Fallback),
            "accept" => Ok(EmptyHistoryPolicy::Accept),
            other => Err(format!(
                "unknown empty history policy '{}', expected 'fallback' or 'accept'",
                other
            )),
        }
    }
}

impl fmt::Display for EmptyHistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyHistoryPolicy::Fallback => write!(f, "fallback"),
            EmptyHistoryPolicy::Accept => write!(f, "accept"),
        }
    }
}

/// Retrieves a repository's history through an ordered chain of loaders
#[derive(Clone)]
pub struct CommitRetriever {
    loaders: Vec<Arc<dyn CommitLoader>>,
    empty_history: EmptyHistoryPolicy,
}

impl CommitRetriever {
    pub fn new(loaders: Vec<Arc<dyn CommitLoader>>, empty_history: EmptyHistoryPolicy) -> Self {
        Self {
            loaders,
            empty_history,
        }
    }

    /// The standard chain: hosting API first, local clone as fallback
    pub fn from_config(config: &Config) -> LoadResult<Self> {
        let api: Arc<dyn CommitLoader> = Arc::new(RemoteApiLoader::new(&config.api)?);
        let clone: Arc<dyn CommitLoader> = Arc::new(LocalCloneLoader::new(&config.clone));
        Ok(Self::new(vec![api, clone], config.retrieval.empty_history))
    }

    /// Names of the loaders, in the order they are tried
    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    pub fn empty_history(&self) -> EmptyHistoryPolicy {
        self.empty_history
    }

    /// Retrieve the history of `repo`, falling back loader by loader
    pub async fn retrieve(&self, repo: &str) -> RetrievalResult {
        let mut failure = RetrievalFailure::default();

        for loader in &self.loaders {
            tracing::info!("Retrieving commits of {} via {} loader", repo, loader.name());

            let commits = match loader.load(repo).await {
                Ok(commits) => commits,
                Err(e) => {
                    tracing::warn!("{} loader failed for {}: {}", loader.name(), repo, e);
                    failure.attempts.push(LoaderAttempt {
                        loader: loader.name().to_string(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(bad) = commits.iter().position(|c| !c.is_valid()) {
                tracing::warn!(
                    "{} loader returned a commit without identifier at position {}",
                    loader.name(),
                    bad
                );
                failure.attempts.push(LoaderAttempt {
                    loader: loader.name().to_string(),
                    kind: "parse".to_string(),
                    message: format!("commit at position {} has no identifier", bad),
                });
                continue;
            }

            if commits.is_empty() && self.empty_history == EmptyHistoryPolicy::Fallback {
                tracing::warn!("{} loader returned no commits for {}", loader.name(), repo);
                failure.attempts.push(LoaderAttempt {
                    loader: loader.name().to_string(),
                    kind: "empty".to_string(),
                    message: "no commits returned".to_string(),
                });
                continue;
            }

            return RetrievalResult::Success {
                source: loader.name().to_string(),
                commits,
            };
        }

        tracing::warn!(
            "All loaders failed for {}: {}",
            repo,
            failure.summary()
        );
        RetrievalResult::Failure(failure)
    }
}
