use serde::{Deserialize, Serialize};
use std::fmt;

/// A single commit, normalized across loaders
///
/// Fields are private so a record cannot change after a loader built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit hash
    id: String,
    /// Author's name
    author_name: String,
    /// Author date exactly as the source reported it
    author_date: String,
    /// Commit message (full message from the API, subject line from git log)
    message: String,
    /// Parent hashes, in source order
    #[serde(default)]
    parents: Vec<String>,
}

impl CommitRecord {
    pub fn new(
        id: impl Into<String>,
        author_name: impl Into<String>,
        author_date: impl Into<String>,
        message: impl Into<String>,
        parents: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_name: author_name.into(),
            author_date: author_date.into(),
            message: message.into(),
            parents,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn author_date(&self) -> &str {
        &self.author_date
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Parent hashes as one space-separated string ("" for a root commit)
    pub fn parents_joined(&self) -> String {
        self.parents.join(" ")
    }

    /// A commit without parents starts the history
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// A record is valid when it carries an identifier
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// One failed loader attempt inside a retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderAttempt {
    /// Loader name ("api" or "clone")
    pub loader: String,
    /// Error kind, or "empty" when an empty history was rejected
    pub kind: String,
    /// Human-readable error message
    pub message: String,
}

/// Why a retrieval produced no commits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalFailure {
    /// Attempts in the order they were made
    pub attempts: Vec<LoaderAttempt>,
}

impl RetrievalFailure {
    /// The error of the final attempt, if any loader ran
    pub fn last_error(&self) -> Option<&LoaderAttempt> {
        self.attempts.last()
    }

    /// One-line summary, e.g. `api: status ...; clone: clone ...`
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no loaders configured".to_string();
        }
        self.attempts
            .iter()
            .map(|a| format!("{}: {}", a.loader, a.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Outcome of one retrieval
///
/// The external contract is the status only; `Failure` carries the loader
/// attempts for logging and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data")]
pub enum RetrievalResult {
    #[serde(rename = "OK")]
    Success {
        /// Name of the loader that produced the commits
        source: String,
        commits: Vec<CommitRecord>,
    },
    #[serde(rename = "NOK")]
    Failure(RetrievalFailure),
}

impl RetrievalResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RetrievalResult::Success { .. })
    }

    /// "OK" or "NOK"
    pub fn status(&self) -> &'static str {
        match self {
            RetrievalResult::Success { .. } => "OK",
            RetrievalResult::Failure(_) => "NOK",
        }
    }

    /// Commits of a successful retrieval, empty on failure
    pub fn commits(&self) -> &[CommitRecord] {
        match self {
            RetrievalResult::Success { commits, .. } => commits,
            RetrievalResult::Failure(_) => &[],
        }
    }

    pub fn into_commits(self) -> Option<Vec<CommitRecord>> {
        match self {
            RetrievalResult::Success { commits, .. } => Some(commits),
            RetrievalResult::Failure(_) => None,
        }
    }
}

impl fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.id.get(..10).unwrap_or(&self.id);
        write!(
            f,
            "{}  {}  {}  {}",
            short,
            self.author_date,
            self.author_name,
            self.subject()
        )
    }
}
