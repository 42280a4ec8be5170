//! Commit loader backed by a throwaway local clone
//!
//! Makes a no-checkout clone into a fresh scratch directory, reads
//! `git log` with tab-separated fields and removes the scratch directory
//! before returning, whatever the outcome.

use crate::config::CloneConfig;
use crate::error::{LoadError, LoadResult};
use crate::loader::CommitLoader;
use crate::types::CommitRecord;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// hash, author name, author date, subject, parent hashes
const LOG_FORMAT: &str = "--pretty=format:%H%x09%an%x09%ad%x09%s%x09%P";
const FIELD_SEPARATOR: char = '\t';
const SCRATCH_PREFIX: &str = "commit-viewer-";
const MAX_STDERR_LEN: usize = 2000;

/// Loads commit history by cloning the repository and reading its log
pub struct LocalCloneLoader {
    base_url: String,
    git_binary: String,
    timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl LocalCloneLoader {
    pub fn new(config: &CloneConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            git_binary: config.git_binary.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            scratch_root: config.scratch_dir.clone(),
        }
    }

    /// Remote URL cloned for `repo`
    pub fn clone_url(&self, repo: &str) -> String {
        format!("{}/{}.git", self.base_url, repo)
    }

    /// Create a uniquely named scratch directory
    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }

    fn git(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.current_dir(cwd)
            // Never block on a credential prompt for private or missing repositories
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a git subprocess, bounded by the configured timeout
    async fn run(&self, mut cmd: Command, label: &str) -> LoadResult<Output> {
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(LoadError::Io(e)),
            Err(_) => Err(LoadError::Timeout {
                command: label.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> LoadResult<()> {
        let mut cmd = self.git(dest.parent().unwrap_or(dest));
        cmd.arg("clone").arg("-n").arg("--quiet").arg(url).arg(dest);

        let output = self.run(cmd, "git clone").await?;
        if !output.status.success() {
            return Err(LoadError::Clone {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_excerpt(&output.stderr),
            });
        }
        Ok(())
    }

    async fn read_log(&self, repo_dir: &Path) -> LoadResult<Vec<CommitRecord>> {
        let mut cmd = self.git(repo_dir);
        cmd.arg("log").arg("--date=default").arg(LOG_FORMAT);

        let output = self.run(cmd, "git log").await?;
        if !output.status.success() {
            return Err(LoadError::Log {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_excerpt(&output.stderr),
            });
        }

        parse_log_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn clone_and_log(&self, repo: &str, scratch: &Path) -> LoadResult<Vec<CommitRecord>> {
        let url = self.clone_url(repo);
        let dest = scratch.join("repo");
        tracing::debug!("Cloning {} into {}", url, dest.display());
        self.clone_repo(&url, &dest).await?;
        self.read_log(&dest).await
    }
}

#[async_trait::async_trait]
impl CommitLoader for LocalCloneLoader {
    fn name(&self) -> &'static str {
        "clone"
    }

    async fn load(&self, repo: &str) -> LoadResult<Vec<CommitRecord>> {
        let scratch = self.scratch_dir()?;
        let result = self.clone_and_log(repo, scratch.path()).await;

        // The TempDir guard also removes the directory if this future is dropped early
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(
                "Failed to remove scratch directory {}: {}",
                scratch_path.display(),
                e
            );
        }

        let commits = result?;
        tracing::info!("Loaded {} commits for {} from clone", commits.len(), repo);
        Ok(commits)
    }
}

/// Parse the whole `git log` output, one commit per non-empty line
pub fn parse_log_output(output: &str) -> LoadResult<Vec<CommitRecord>> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(parse_log_line)
        .collect()
}

/// Parse one `hash\tauthor\tdate\tsubject[\tparents]` line
///
/// The parents column is the last field; without it the record has no parents.
pub fn parse_log_line(line: &str) -> LoadResult<CommitRecord> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() < 4 {
        return Err(LoadError::Parse(format!(
            "expected at least 4 tab-separated fields, got {}: {:?}",
            fields.len(),
            line
        )));
    }

    let id = fields[0].trim();
    if id.is_empty() {
        return Err(LoadError::Parse(format!("log line without hash: {:?}", line)));
    }

    let (subject, parents) = if fields.len() >= 5 {
        let last = fields.len() - 1;
        let parents = fields[last]
            .split_whitespace()
            .map(String::from)
            .collect();
        (fields[3..last].join("\t"), parents)
    } else {
        (fields[3].to_string(), Vec::new())
    };

    Ok(CommitRecord::new(id, fields[1], fields[2], subject, parents))
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() > MAX_STDERR_LEN {
        let mut end = MAX_STDERR_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}
