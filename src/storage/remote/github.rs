//! [`GitHost`] over the GitHub REST API.
//!
//! Blocking HTTPS with bearer auth and an explicit per-call timeout. Nothing is
//! retried; every failure is mapped to one [`StorageError`] kind by status code.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::remote::host::{
    BlobRef, ContentsEntry, ContentsFile, ContentsWrite, DeleteContents, GitCommit, GitHost, GitRef,
    GitTree, NewBlob, NewCommit, NewTree, PutContents, UpdateRef,
};
use crate::storage::types::{BranchName, CommitId, ContentPath, TreeId};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const API_VERSION: &str = "2022-11-28";

/// Coordinates and credentials of the content repository on GitHub.
///
/// Owner, repository and token stay optional so an incomplete configuration
/// can be reported by name instead of failing at parse time.
#[derive(Clone)]
pub struct GithubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GithubConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            repo: Some(repo.into()),
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Point at a GitHub Enterprise instance or a test server.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Environment variable names of the settings that are missing or blank.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            ("GITHUB_OWNER", &self.owner),
            ("GITHUB_REPO", &self.repo),
            ("GITHUB_TOKEN", &self.token),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_settings().is_empty()
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// How an unprocessable (422) answer is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Plain,
    /// carries a version or parent precondition; 422 means it no longer holds
    Conditional,
}

/// Map a non-success status to an error kind.
fn classify_status(status: u16, kind: CallKind, subject: &str, message: String) -> StorageError {
    match status {
        401 => StorageError::Unauthorized(message),
        403 => StorageError::Forbidden(message),
        404 => StorageError::NotFound(subject.to_string()),
        409 => StorageError::Conflict {
            path: subject.to_string(),
            reason: message,
        },
        422 if kind == CallKind::Conditional => StorageError::Conflict {
            path: subject.to_string(),
            reason: message,
        },
        400..=499 => StorageError::Rejected { status, message },
        _ => StorageError::Transport(format!("{} answered {}: {}", subject, status, message)),
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// GitHub-backed content host.
pub struct GithubHost {
    client: Client,
    base: Url,
    owner: String,
    repo: String,
    token: String,
}

impl GithubHost {
    /// Fails with `NotConfigured` naming every missing setting.
    pub fn new(config: GithubConfig) -> StorageResult<Self> {
        let missing = config.missing_settings();
        if !missing.is_empty() {
            return Err(StorageError::NotConfigured(format!("missing {}", missing.join(", "))));
        }

        let base = Url::parse(&config.api_base)
            .map_err(|e| StorageError::NotConfigured(format!("invalid api url '{}': {}", config.api_base, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("cannot build http client: {}", e)))?;

        Ok(Self {
            client,
            base,
            owner: config.owner.unwrap_or_default(),
            repo: config.repo.unwrap_or_default(),
            token: config.token.unwrap_or_default(),
        })
    }

    /// `<base>/repos/<owner>/<repo>/<segments...>`, each segment escaped.
    fn repo_url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> StorageResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::NotConfigured(format!("api url '{}' cannot take a path", self.base)))?
            .pop_if_empty()
            .push("repos")
            .push(&self.owner)
            .push(&self.repo)
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, path: &ContentPath, branch: Option<&BranchName>) -> StorageResult<Url> {
        let mut url = self.repo_url(std::iter::once("contents").chain(path.segments()))?;
        if let Some(branch) = branch {
            url.query_pairs_mut().append_pair("ref", branch.as_str());
        }
        Ok(url)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, kind: CallKind, subject: &str) -> StorageResult<T> {
        let response = request.bearer_auth(&self.token).send().map_err(|e| {
            if e.is_timeout() {
                StorageError::Transport(format!("{}: request timed out", subject))
            } else {
                StorageError::Transport(format!("{}: {}", subject, e))
            }
        })?;

        let status = response.status();
        debug!(subject, status = status.as_u16(), "github response");

        if status.is_success() {
            return response
                .json::<T>()
                .map_err(|e| StorageError::Transport(format!("{}: unreadable response: {}", subject, e)));
        }

        let message = response
            .json::<ApiMessage>()
            .map(|body| body.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

        Err(classify_status(status.as_u16(), kind, subject, message))
    }
}

impl GitHost for GithubHost {
    fn describe(&self) -> String {
        format!("github:{}/{}", self.owner, self.repo)
    }

    fn check_access(&self) -> StorageResult<()> {
        let url = self.repo_url(std::iter::empty())?;
        let subject = format!("repository {}/{}", self.owner, self.repo);
        self.send::<serde_json::Value>(self.client.get(url), CallKind::Plain, &subject)?;
        Ok(())
    }

    fn get_contents(&self, path: &ContentPath, branch: &BranchName) -> StorageResult<Option<ContentsFile>> {
        let url = self.contents_url(path, Some(branch))?;
        match self.send(self.client.get(url), CallKind::Plain, path.as_str()) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_contents(&self, dir: &ContentPath, branch: &BranchName) -> StorageResult<Vec<ContentsEntry>> {
        let url = self.contents_url(dir, Some(branch))?;
        match self.send(self.client.get(url), CallKind::Plain, dir.as_str()) {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn put_contents(&self, path: &ContentPath, request: &PutContents) -> StorageResult<ContentsWrite> {
        let url = self.contents_url(path, None)?;
        self.send(self.client.put(url).json(request), CallKind::Conditional, path.as_str())
    }

    fn delete_contents(&self, path: &ContentPath, request: &DeleteContents) -> StorageResult<ContentsWrite> {
        let url = self.contents_url(path, None)?;
        self.send(self.client.delete(url).json(request), CallKind::Conditional, path.as_str())
    }

    fn get_ref(&self, branch: &BranchName) -> StorageResult<GitRef> {
        let url = self.repo_url(["git", "ref", "heads"].into_iter().chain(branch.as_str().split('/')))?;
        self.send(self.client.get(url), CallKind::Plain, &branch.as_ref_path())
    }

    fn get_commit(&self, sha: &CommitId) -> StorageResult<GitCommit> {
        let url = self.repo_url(["git", "commits", sha.as_str()])?;
        self.send(self.client.get(url), CallKind::Plain, &format!("commit {}", sha))
    }

    fn get_tree(&self, sha: &TreeId, recursive: bool) -> StorageResult<GitTree> {
        let mut url = self.repo_url(["git", "trees", sha.as_str()])?;
        if recursive {
            url.query_pairs_mut().append_pair("recursive", "1");
        }
        self.send(self.client.get(url), CallKind::Plain, &format!("tree {}", sha))
    }

    fn create_blob(&self, blob: &NewBlob) -> StorageResult<BlobRef> {
        let url = self.repo_url(["git", "blobs"])?;
        self.send(self.client.post(url).json(blob), CallKind::Plain, "new blob")
    }

    fn create_tree(&self, tree: &NewTree) -> StorageResult<GitTree> {
        let url = self.repo_url(["git", "trees"])?;
        self.send(self.client.post(url).json(tree), CallKind::Plain, "new tree")
    }

    fn create_commit(&self, commit: &NewCommit) -> StorageResult<GitCommit> {
        let url = self.repo_url(["git", "commits"])?;
        self.send(self.client.post(url).json(commit), CallKind::Plain, "new commit")
    }

    fn update_ref(&self, branch: &BranchName, update: &UpdateRef) -> StorageResult<GitRef> {
        let url = self.repo_url(["git", "refs", "heads"].into_iter().chain(branch.as_str().split('/')))?;
        self.send(self.client.patch(url).json(update), CallKind::Conditional, &branch.as_ref_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> GithubHost {
        GithubHost::new(GithubConfig::new("jane", "site", "t0ken").api_base("https://ghe.example/api/v3/")).unwrap()
    }

    #[test]
    fn test_missing_settings() {
        let config = GithubConfig {
            owner: Some("jane".to_string()),
            token: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.missing_settings(), vec!["GITHUB_REPO", "GITHUB_TOKEN"]);
        assert!(!config.is_complete());

        match GithubHost::new(config) {
            Err(StorageError::NotConfigured(message)) => {
                assert_eq!(message, "missing GITHUB_REPO, GITHUB_TOKEN")
            }
            _ => panic!("expected NotConfigured"),
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GithubConfig::new("jane", "site", "secret-token");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_urls() {
        let host = host();
        let path = ContentPath::new("content/blog/hello world.md").unwrap();
        let url = host.contents_url(&path, Some(&BranchName::main())).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example/api/v3/repos/jane/site/contents/content/blog/hello%20world.md?ref=main"
        );

        let branch = BranchName::new("content/drafts").unwrap();
        let url = host
            .repo_url(["git", "refs", "heads"].into_iter().chain(branch.as_str().split('/')))
            .unwrap();
        assert_eq!(url.as_str(), "https://ghe.example/api/v3/repos/jane/site/git/refs/heads/content/drafts");
    }

    #[test]
    fn test_classify_status() {
        let plain = |status| classify_status(status, CallKind::Plain, "content/a.md", "msg".to_string());
        let conditional = |status| classify_status(status, CallKind::Conditional, "content/a.md", "msg".to_string());

        assert!(matches!(plain(401), StorageError::Unauthorized(_)));
        assert!(matches!(plain(403), StorageError::Forbidden(_)));
        assert!(plain(404).is_not_found());
        assert!(plain(409).is_conflict());
        assert!(conditional(422).is_conflict());
        assert!(matches!(plain(422), StorageError::Rejected { status: 422, .. }));
        assert!(matches!(plain(400), StorageError::Rejected { status: 400, .. }));
        assert!(plain(502).is_retriable());
        assert!(plain(500).is_retriable());
    }
}
