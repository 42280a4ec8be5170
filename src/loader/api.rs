//! Commit loader backed by the hosting provider's REST API
//!
//! Walks `GET /repos/{owner}/{name}/commits` page by page, following the
//! `Link: <...>; rel="next"` response header until it disappears.

use crate::config::{ApiConfig, ApiCredentials};
use crate::error::{LoadError, LoadResult};
use crate::loader::CommitLoader;
use crate::types::CommitRecord;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Loads commit history through the paginated commits endpoint
pub struct RemoteApiLoader {
    client: reqwest::Client,
    base_url: String,
    per_page: u32,
    timeout: Duration,
    credentials: Option<ApiCredentials>,
}

/// Scheme, host and port of a URL
type Origin = (String, Option<String>, Option<u16>);

fn origin_of(url: &str) -> Option<Origin> {
    let url = reqwest::Url::parse(url).ok()?;
    Some((
        url.scheme().to_string(),
        url.host_str().map(str::to_string),
        url.port_or_known_default(),
    ))
}

impl RemoteApiLoader {
    /// Build a loader from API configuration
    ///
    /// The request timeout applies to every page request individually.
    pub fn new(config: &ApiConfig) -> LoadResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("commit-viewer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoadError::Transport {
                url: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
            timeout,
            credentials: config.credentials.clone(),
        })
    }

    /// URL of the first page for `repo`
    pub fn first_page_url(&self, repo: &str) -> String {
        format!(
            "{}/repos/{}/commits?page=1&per_page={}",
            self.base_url, repo, self.per_page
        )
    }

    /// Whether `url` points at the configured API host
    ///
    /// Credentials are only sent there, never to hosts named in `Link` headers.
    pub fn is_api_origin(&self, url: &str) -> bool {
        match (origin_of(&self.base_url), origin_of(url)) {
            (Some(base), Some(other)) => base == other,
            _ => false,
        }
    }

    /// Fetch one page, returning its commits and the next page URL (if any)
    async fn fetch_page(&self, url: &str) -> LoadResult<(Vec<CommitRecord>, Option<String>)> {
        let mut request = self.client.get(url).header(ACCEPT, ACCEPT_JSON);
        if let Some(creds) = &self.credentials {
            if self.is_api_origin(url) {
                request = request.basic_auth(&creds.user, Some(&creds.token));
            } else {
                tracing::warn!("Not sending credentials to foreign host {}", url);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LoadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let next = next_page_url(response.headers());

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let page: Vec<ApiCommit> = serde_json::from_str(&body)
            .map_err(|e| LoadError::Parse(format!("invalid commit page from {}: {}", url, e)))?;

        let commits = page
            .into_iter()
            .map(ApiCommit::into_record)
            .collect::<LoadResult<Vec<_>>>()?;

        Ok((commits, next))
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> LoadError {
        let reason = if err.is_timeout() {
            format!("timed out after {} seconds", self.timeout.as_secs())
        } else {
            err.to_string()
        };
        LoadError::Transport {
            url: url.to_string(),
            reason,
        }
    }
}

#[async_trait::async_trait]
impl CommitLoader for RemoteApiLoader {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn load(&self, repo: &str) -> LoadResult<Vec<CommitRecord>> {
        let mut commits = Vec::new();
        let mut next_url = Some(self.first_page_url(repo));
        let mut visited = HashSet::new();

        // Pages depend on the previous response, so they are fetched strictly in order
        while let Some(url) = next_url.take() {
            if !visited.insert(url.clone()) {
                return Err(LoadError::Parse(format!(
                    "pagination loop: {} was already fetched",
                    url
                )));
            }
            let (page, next) = self.fetch_page(&url).await?;
            tracing::debug!(
                "Fetched page {} of {} ({} commits)",
                visited.len(),
                repo,
                page.len()
            );
            commits.extend(page);
            next_url = next;
        }

        tracing::info!(
            "Loaded {} commits for {} from API in {} page(s)",
            commits.len(),
            repo,
            visited.len()
        );
        Ok(commits)
    }
}

/// Extract the `rel="next"` target from `Link` headers
///
/// Example header:
/// `<https://api.github.com/repositories/1/commits?page=2>; rel="next", <...>; rel="last"`
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_next_link)
}

fn parse_next_link(entry: &str) -> Option<String> {
    let mut parts = entry.split(';');
    let target = parts.next()?.trim();
    let is_next = parts.any(|param| {
        let param = param.trim();
        param == "rel=\"next\"" || param == "rel=next"
    });
    if !is_next {
        return None;
    }

    let url = target.trim_start_matches('<').trim_end_matches('>').trim();
    (!url.is_empty()).then(|| url.to_string())
}

// Hosting API payload types
#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    #[serde(default)]
    parents: Vec<ApiParent>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    author: Option<ApiSignature>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: String,
}

#[derive(Debug, Deserialize)]
struct ApiParent {
    sha: String,
}

impl ApiCommit {
    fn into_record(self) -> LoadResult<CommitRecord> {
        if self.sha.trim().is_empty() {
            return Err(LoadError::Parse("commit without sha".to_string()));
        }
        let (author_name, author_date) = self
            .commit
            .author
            .map(|a| (a.name, a.date))
            .unwrap_or_default();
        let parents = self.parents.into_iter().map(|p| p.sha).collect();

        Ok(CommitRecord::new(
            self.sha,
            author_name,
            author_date,
            self.commit.message,
            parents,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn loader_for(base_url: &str) -> RemoteApiLoader {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        RemoteApiLoader::new(&config).unwrap()
    }

    #[test]
    fn test_first_page_url() {
        let loader = loader_for("https://api.github.com/");
        assert_eq!(
            loader.first_page_url("org/repo"),
            "https://api.github.com/repos/org/repo/commits?page=1&per_page=100"
        );
    }

    #[test]
    fn test_is_api_origin() {
        let loader = loader_for("https://api.github.com");
        assert!(loader.is_api_origin("https://api.github.com/repositories/1/commits?page=2"));
        assert!(loader.is_api_origin("https://api.github.com:443/repos/a/b/commits"));
        assert!(!loader.is_api_origin("http://api.github.com/repos/a/b/commits"));
        assert!(!loader.is_api_origin("https://evil.example.com/repos/a/b/commits"));
        assert!(!loader.is_api_origin("https://api.github.com.evil.example.com/x"));
        assert!(!loader.is_api_origin("not a url"));

        let local = loader_for("http://127.0.0.1:8080/");
        assert!(local.is_api_origin("http://127.0.0.1:8080/repos/a/b/commits?page=3"));
        assert!(!local.is_api_origin("http://127.0.0.1:9090/repos/a/b/commits?page=3"));
    }

    #[test]
    fn test_next_page_url_found() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/commits?page=2>; rel=\"next\", \
                 <https://api.github.com/repositories/1/commits?page=9>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://api.github.com/repositories/1/commits?page=2")
        );
    }

    #[test]
    fn test_next_page_url_last_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/commits?page=1>; rel=\"first\", \
                 <https://api.github.com/repositories/1/commits?page=8>; rel=\"prev\"",
            ),
        );
        assert_eq!(next_page_url(&headers), None);
    }

    #[test]
    fn test_next_page_url_missing_header() {
        assert_eq!(next_page_url(&HeaderMap::new()), None);
    }

    #[test]
    fn test_next_page_url_second_header_value() {
        let mut headers = HeaderMap::new();
        headers.append(LINK, HeaderValue::from_static("<http://x/1>; rel=\"prev\""));
        headers.append(LINK, HeaderValue::from_static("<http://x/3>; rel=\"next\""));
        assert_eq!(next_page_url(&headers).as_deref(), Some("http://x/3"));
    }

    #[test]
    fn test_api_commit_mapping() {
        let json = r#"[{
            "sha": "abc123",
            "commit": {
                "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-01-02T03:04:05Z"},
                "message": "Merge branch 'x'\n\nbody"
            },
            "parents": [{"sha": "p1", "url": "u1"}, {"sha": "p2", "url": "u2"}]
        }]"#;
        let page: Vec<ApiCommit> = serde_json::from_str(json).unwrap();
        let record = page.into_iter().next().unwrap().into_record().unwrap();

        assert_eq!(record.id(), "abc123");
        assert_eq!(record.author_name(), "Ada");
        assert_eq!(record.author_date(), "2024-01-02T03:04:05Z");
        assert_eq!(record.message(), "Merge branch 'x'\n\nbody");
        assert_eq!(record.parents_joined(), "p1 p2");
    }

    #[test]
    fn test_api_commit_without_parents_is_root() {
        let json = r#"{"sha": "root", "commit": {"author": {"name": "A", "date": "D"}, "message": "init"}, "parents": []}"#;
        let commit: ApiCommit = serde_json::from_str(json).unwrap();
        assert!(commit.into_record().unwrap().is_root());
    }

    #[test]
    fn test_api_commit_empty_sha_rejected() {
        let json = r#"{"sha": "", "commit": {"message": "x"}}"#;
        let commit: ApiCommit = serde_json::from_str(json).unwrap();
        assert!(matches!(commit.into_record(), Err(LoadError::Parse(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Reserve a port, then free it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let loader = loader_for(&format!("http://127.0.0.1:{}", port));
        let err = loader.load("org/repo").await.unwrap_err();
        assert!(matches!(err, LoadError::Transport { .. }), "got {err:?}");
    }
}
