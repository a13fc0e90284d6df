//! The handful of GitHub REST calls the update and release commands use.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::client::{HttpError, RequestBuilderExt};

const API_ROOT: &str = "https://api.github.com/";

/// Repository statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    pub pushed_at: DateTime<Utc>,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Publication day as `YYYY-MM-DD`.
    #[must_use]
    pub fn published_day(&self) -> String {
        self.published_at
            .map_or_else(|| "N/A".to_owned(), |at| at.format("%Y-%m-%d").to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetails {
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetails,
}

impl Commit {
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    /// First line of the commit message.
    #[must_use]
    pub fn title(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub commits: Vec<Commit>,
}

/// Thin GitHub API wrapper over the shared client.
#[derive(Debug, Clone)]
pub struct GitHub {
    http: reqwest::Client,
    root: String,
}

impl GitHub {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_root(http, API_ROOT)
    }

    /// Client for a GitHub-compatible API served at `root`.
    #[must_use]
    pub fn with_root(http: reqwest::Client, root: impl Into<String>) -> Self {
        Self {
            http,
            root: root.into(),
        }
    }

    /// `repos/{repo}/{path...}`, with each part percent-encoded as a segment.
    fn endpoint(&self, repo: &str, path: &[&str]) -> Result<Url, HttpError> {
        let mut url = Url::parse(&self.root)?;
        url.path_segments_mut()
            .map_err(|()| HttpError::BaseUrl(self.root.clone()))?
            .pop_if_empty()
            .push("repos")
            .extend(repo.split('/'))
            .extend(path);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// `repo` is `owner/name`.
    pub async fn repo(&self, repo: &str) -> Result<RepoInfo, HttpError> {
        self.get(self.endpoint(repo, &[])?).read_json().await
    }

    /// Releases, newest first.
    pub async fn releases(&self, repo: &str) -> Result<Vec<Release>, HttpError> {
        self.get(self.endpoint(repo, &["releases"])?)
            .read_json()
            .await
    }

    /// Head commit of `branch`.
    pub async fn branch_head(&self, repo: &str, branch: &str) -> Result<Commit, HttpError> {
        self.get(self.endpoint(repo, &["commits", branch])?)
            .read_json()
            .await
    }

    /// Commits between `base` and `head`, oldest first.
    pub async fn compare(
        &self,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Comparison, HttpError> {
        let range = format!("{base}...{head}");
        self.get(self.endpoint(repo, &["compare", &range])?)
            .read_json()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::create_client;

    #[test]
    fn test_endpoints() {
        let github = GitHub::new(create_client().unwrap());
        assert_eq!(
            github.endpoint("owner/name", &[]).unwrap().as_str(),
            "https://api.github.com/repos/owner/name"
        );
        assert_eq!(
            github
                .endpoint("owner/name", &["compare", "abc...def"])
                .unwrap()
                .as_str(),
            "https://api.github.com/repos/owner/name/compare/abc...def"
        );

        let local = GitHub::with_root(create_client().unwrap(), "http://127.0.0.1:8080/api");
        assert_eq!(
            local.endpoint("a/b", &["commits", "main"]).unwrap().as_str(),
            "http://127.0.0.1:8080/api/repos/a/b/commits/main"
        );
        assert!(matches!(
            GitHub::with_root(create_client().unwrap(), "not a url").endpoint("a/b", &[]),
            Err(HttpError::Url(_))
        ));
    }

    #[test]
    fn test_repo_info_parses_pushed_at() {
        let info: RepoInfo = serde_json::from_str(
            r#"{"stargazers_count": 12, "forks_count": 3, "open_issues_count": 1,
                "pushed_at": "2024-05-01T12:30:59Z", "html_url": "https://github.com/a/b"}"#,
        )
        .unwrap();
        assert_eq!(info.stargazers_count, 12);
        assert_eq!(
            crate::storage::format_marker_date(&info.pushed_at),
            "2024-05-01 12:30 UTC"
        );
    }

    #[test]
    fn test_commit_helpers() {
        let commit: Commit = serde_json::from_str(
            r#"{"sha": "0123456789abcdef", "commit": {"message": "Fix thing\n\nlong body",
                "author": {"name": "dev"}}}"#,
        )
        .unwrap();
        assert_eq!(commit.short_sha(), "0123456");
        assert_eq!(commit.title(), "Fix thing");
    }

    #[test]
    fn test_release_day() {
        let release: Release = serde_json::from_str(
            r#"{"tag_name": "v27.0", "html_url": "u", "prerelease": false,
                "published_at": "2023-11-02T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(release.published_day(), "2023-11-02");
    }
}
