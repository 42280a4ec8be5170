/// Configuration system for commit-viewer
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, ViewerError};
use crate::retriever::EmptyHistoryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Hosting API loader configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Clone loader configuration
    #[serde(default)]
    pub clone: CloneConfig,

    /// Retrieval policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Commit store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Static credential pair for the hosting API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiCredentials {
    pub user: String,
    pub token: String,
}

/// Hosting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API (e.g. "https://api.github.com")
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Commits requested per page
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Timeout for each HTTP request, in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Optional credentials, sent as HTTP basic auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ApiCredentials>,
}

/// Clone loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfig {
    /// Base URL repositories are cloned from (e.g. "https://github.com")
    #[serde(default = "default_clone_url")]
    pub base_url: String,

    /// git executable
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Timeout for each git subprocess, in seconds
    #[serde(default = "default_clone_timeout")]
    pub timeout_secs: u64,

    /// Where scratch clones are created (system temp dir when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

/// Retrieval policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalConfig {
    /// What an empty but successful load means
    #[serde(default)]
    pub empty_history: EmptyHistoryPolicy,
}

/// Commit store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file path
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long a writer waits for another process holding the store lock
    #[serde(default = "default_store_lock_timeout")]
    pub lock_timeout_secs: u64,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    3
}

fn default_clone_url() -> String {
    "https://github.com".to_string()
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_clone_timeout() -> u64 {
    300
}

fn default_store_path() -> PathBuf {
    crate::paths::PlatformPaths::default_store_path()
}

fn default_store_lock_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            per_page: default_per_page(),
            timeout_secs: default_request_timeout(),
            credentials: None,
        }
    }
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            base_url: default_clone_url(),
            git_binary: default_git_binary(),
            timeout_secs: default_clone_timeout(),
            scratch_dir: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout_secs: default_store_lock_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ViewerError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, ViewerError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ViewerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ViewerError> {
        for (key, url) in [
            ("api.base_url", &self.api.base_url),
            ("clone.base_url", &self.clone.base_url),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must not be empty".to_string(),
                }
                .into());
            }
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                key: "api.base_url".to_string(),
                reason: format!("must be an http(s) URL, got '{}'", self.api.base_url),
            }
            .into());
        }

        // The hosting API caps page size at 100
        if !(1..=100).contains(&self.api.per_page) {
            return Err(ConfigError::InvalidValue {
                key: "api.per_page".to_string(),
                reason: format!("must be between 1 and 100, got {}", self.api.per_page),
            }
            .into());
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.clone.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "clone.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.store.lock_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "store.lock_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.clone.git_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "clone.git_binary".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if let Some(creds) = &self.api.credentials
            && (creds.user.is_empty() || creds.token.is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: "api.credentials".to_string(),
                reason: "user and token must both be set".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COMMIT_VIEWER_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(per_page) = std::env::var("COMMIT_VIEWER_PER_PAGE")
            && let Ok(n) = per_page.parse()
        {
            self.api.per_page = n;
        }

        if let Ok(timeout) = std::env::var("COMMIT_VIEWER_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.api.timeout_secs = secs;
        }

        // Credentials only apply as a pair
        if let (Ok(user), Ok(token)) = (
            std::env::var("COMMIT_VIEWER_GITHUB_USER"),
            std::env::var("COMMIT_VIEWER_GITHUB_TOKEN"),
        ) {
            self.api.credentials = Some(ApiCredentials { user, token });
        }

        if let Ok(url) = std::env::var("COMMIT_VIEWER_CLONE_URL") {
            self.clone.base_url = url;
        }

        if let Ok(git) = std::env::var("COMMIT_VIEWER_GIT_BINARY") {
            self.clone.git_binary = git;
        }

        if let Ok(timeout) = std::env::var("COMMIT_VIEWER_CLONE_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.clone.timeout_secs = secs;
        }

        if let Ok(dir) = std::env::var("COMMIT_VIEWER_SCRATCH_DIR") {
            self.clone.scratch_dir = Some(PathBuf::from(dir));
        }

        if let Ok(policy) = std::env::var("COMMIT_VIEWER_EMPTY_POLICY")
            && let Ok(policy) = policy.parse()
        {
            self.retrieval.empty_history = policy;
        }

        if let Ok(path) = std::env::var("COMMIT_VIEWER_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, ViewerError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::new`], but reads the file at `path` instead of the default location
    pub fn from_path_with_env(path: &Path) -> Result<Self, ViewerError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
