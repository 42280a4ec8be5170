/// Centralized error types for commit-viewer using thiserror
///
/// Loader errors are recoverable inside the retriever (they trigger the next
/// loader); everything else surfaces through `ViewerError`.
use thiserror::Error;

/// Main error type for the commit viewer
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Could not retrieve commits for '{repo}': {reason}")]
    RetrievalFailed { repo: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a single commit loader
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse commit data: {0}")]
    Parse(String),

    #[error("git clone failed (exit {status}): {stderr}")]
    Clone { status: i32, stderr: String },

    #[error("git log failed (exit {status}): {stderr}")]
    Log { status: i32, stderr: String },

    #[error("{command} timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to the commit store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to load store from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save store to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to lock store file '{path}': {reason}")]
    LockFailed { path: String, reason: String },
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty {0}")]
    Empty(String),
}

/// Result alias for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

// Conversion from anyhow::Error to ViewerError
impl From<anyhow::Error> for ViewerError {
    fn from(err: anyhow::Error) -> Self {
        ViewerError::Other(format!("{:#}", err))
    }
}

impl ViewerError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        ViewerError::Other(msg.into())
    }

    /// Check if this is a user error (bad input or config) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ViewerError::Validation(_) | ViewerError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ViewerError::RetrievalFailed { .. }
                | ViewerError::Load(LoadError::Transport { .. })
                | ViewerError::Load(LoadError::Timeout { .. })
                | ViewerError::Io(_)
        )
    }
}

impl LoadError {
    /// Short machine-friendly kind, used in logs and failure summaries
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Transport { .. } => "transport",
            LoadError::Status { .. } => "status",
            LoadError::Parse(_) => "parse",
            LoadError::Clone { .. } => "clone",
            LoadError::Log { .. } => "log",
            LoadError::Timeout { .. } => "timeout",
            LoadError::Io(_) => "io",
        }
    }
}
