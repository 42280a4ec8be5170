//! Shared fixtures: a minimal commits API server and local git repositories
#![allow(dead_code)]

use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Response served for one page number
#[derive(Clone)]
pub enum Page {
    /// JSON body, with a `rel="next"` link to `next` when set
    Json { body: String, next: Option<u32> },
    /// JSON body with a `rel="next"` link to an arbitrary URL
    Linked { body: String, next_url: String },
    /// Bare status code with an empty body
    Status(u16),
    /// Never answers
    Hang,
}

impl Page {
    pub fn commits(shas: &[&str], next: Option<u32>) -> Self {
        Page::Json {
            body: commits_body(shas),
            next,
        }
    }

    pub fn commits_linking_to(shas: &[&str], next_url: &str) -> Self {
        Page::Linked {
            body: commits_body(shas),
            next_url: next_url.to_string(),
        }
    }

    pub fn raw(body: &str) -> Self {
        Page::Json {
            body: body.to_string(),
            next: None,
        }
    }
}

fn commits_body(shas: &[&str]) -> String {
    let commits: Vec<_> = shas
        .iter()
        .enumerate()
        .map(|(i, sha)| {
            let parent = shas.get(i + 1).map(|p| vec![*p]).unwrap_or_default();
            api_commit(sha, &format!("Message {}", sha), &parent)
        })
        .collect();
    serde_json::Value::Array(commits).to_string()
}

pub fn api_commit(sha: &str, message: &str, parents: &[&str]) -> serde_json::Value {
    json!({
        "sha": sha,
        "commit": {
            "author": {
                "name": "Test Author",
                "email": "test@example.com",
                "date": "2024-03-01T12:00:00Z"
            },
            "message": message
        },
        "parents": parents.iter().map(|p| json!({ "sha": p, "url": "" })).collect::<Vec<_>>()
    })
}

/// Commits API stand-in; page `n` of any repository is `pages[n - 1]`
pub struct MockApi {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockApi {
    pub async fn start(pages: Vec<Page>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pages = Arc::new(pages);

        let log = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let pages = pages.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    serve(stream, addr, &pages, &log).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request heads received so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Request targets (path and query) received so far
    pub fn targets(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|head| head.split_whitespace().nth(1).map(String::from))
            .collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, addr: SocketAddr, pages: &[Page], log: &Mutex<Vec<String>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let head = String::from_utf8_lossy(&buf).to_string();
    log.lock().unwrap().push(head.clone());

    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let page_no: usize = query_param(query, "page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);

    let response = match page_no.checked_sub(1).and_then(|i| pages.get(i)) {
        Some(Page::Json { body, next }) => {
            let next_url = next.map(|n| {
                let per_page = query_param(query, "per_page").unwrap_or("100");
                format!("http://{}{}?page={}&per_page={}", addr, path, n, per_page)
            });
            json_response(body, next_url.as_deref())
        }
        Some(Page::Linked { body, next_url }) => json_response(body, Some(next_url.as_str())),
        Some(Page::Status(code)) => format!(
            "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        ),
        Some(Page::Hang) => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return;
        }
        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string(),
    };

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn json_response(body: &str, next_url: Option<&str>) -> String {
    let link = next_url
        .map(|url| format!("Link: <{}>; rel=\"next\"\r\n", url))
        .unwrap_or_default();
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        body.len(),
        link,
        body
    )
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// A base URL nothing listens on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

// ===== Local git repositories =====

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Guard for tests that need the `git` executable
///
/// Without git the test is skipped with a note on stderr, except under CI
/// (`CI` or `COMMIT_VIEWER_REQUIRE_GIT` set), where it fails.
pub fn require_git(test: &str) -> bool {
    if git_available() {
        return true;
    }
    if std::env::var_os("CI").is_some() || std::env::var_os("COMMIT_VIEWER_REQUIRE_GIT").is_some()
    {
        panic!("{test}: git executable not found, but clone tests are required here");
    }
    eprintln!("{test}: git executable not found, skipping");
    false
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create `<base>/<repo>.git` with one empty commit per message, oldest first
///
/// The directory is what the clone loader resolves for `repo` when its base
/// URL is `base`.
pub fn init_repo(base: &Path, repo: &str, messages: &[&str]) -> PathBuf {
    let dir = base.join(format!("{}.git", repo));
    std::fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "--quiet"]);
    for message in messages {
        git_as_author(&dir, &["commit", "--allow-empty", "--quiet", "-m", message]);
    }
    dir
}

/// Run git with a fixed author identity and signing disabled
pub fn git_as_author(dir: &Path, args: &[&str]) -> String {
    let mut full = vec![
        "-c",
        "user.name=Test Author",
        "-c",
        "user.email=test@example.com",
        "-c",
        "commit.gpgsign=false",
    ];
    full.extend_from_slice(args);
    git(dir, &full)
}

/// Commit hashes of `dir`, newest first
pub fn rev_list(dir: &Path) -> Vec<String> {
    git(dir, &["rev-list", "HEAD"])
        .lines()
        .map(String::from)
        .collect()
}

pub fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}
