use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::RepoSourceConfig;
use crate::source::{CommitInfo, EntryKind, RepoRef, RepoSource, TreeEntry};

/// [`RepoSource`] implementation over the GitHub REST API (or a compatible
/// self-hosted endpoint via `REPO_QA_SOURCE_API_URL`).
pub struct GithubSource {
    client: reqwest::Client,
    api_url: String,
    fallback_token: Option<String>,
}

impl GithubSource {
    pub fn new(client: reqwest::Client, config: &RepoSourceConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            fallback_token: config.token.clone(),
        }
    }

    /// Per-repo token when the caller supplied one, otherwise the
    /// service-wide fallback.
    fn token_for<'a>(&'a self, repo: &'a RepoRef) -> Option<&'a str> {
        repo.token.as_deref().or(self.fallback_token.as_deref())
    }

    fn get(&self, repo: &RepoRef, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = self.token_for(repo) {
            req = req.bearer_auth(token);
        }
        req
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Deserialize)]
struct ContentsEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
    author: Option<AccountRef>,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: Option<String>,
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct AccountRef {
    avatar_url: Option<String>,
}

#[async_trait]
impl RepoSource for GithubSource {
    async fn list_dir(&self, repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url, repo.owner, repo.repo, path
        );

        let resp = self
            .get(repo, &url, "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to list {}/{}:{path}", repo.owner, repo.repo))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Contents API returned {status} for {path:?}");
        }

        let entries: Vec<ContentsEntry> = resp
            .json()
            .await
            .context("Failed to parse contents listing")?;

        Ok(entries
            .into_iter()
            .filter_map(|e| {
                let kind = match e.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    // symlinks and submodules are not indexable
                    _ => return None,
                };
                Some(TreeEntry {
                    path: e.path,
                    name: e.name,
                    kind,
                })
            })
            .collect())
    }

    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url, repo.owner, repo.repo, path
        );

        // The raw media type skips the base64 envelope entirely
        let resp = self
            .get(repo, &url, "application/vnd.github.raw+json")
            .send()
            .await
            .with_context(|| format!("Failed to fetch {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Contents API returned {status} for file {path:?}");
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read body of {path}"))
    }

    async fn list_commits(&self, repo: &RepoRef) -> Result<Vec<CommitInfo>> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.api_url, repo.owner, repo.repo
        );

        let resp = self
            .get(repo, &url, "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to list commits of {}/{}", repo.owner, repo.repo))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Commits API returned {status}");
        }

        let entries: Vec<CommitEntry> = resp
            .json()
            .await
            .context("Failed to parse commit listing")?;

        Ok(entries
            .into_iter()
            .map(|e| CommitInfo {
                hash: e.sha,
                message: e.commit.message.unwrap_or_default(),
                author_name: e
                    .commit
                    .author
                    .as_ref()
                    .and_then(|a| a.name.clone())
                    .unwrap_or_default(),
                author_avatar: e
                    .author
                    .and_then(|a| a.avatar_url)
                    .unwrap_or_default(),
                date: e
                    .commit
                    .author
                    .and_then(|a| a.date)
                    .unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn fetch_diff(&self, repo: &RepoRef, hash: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_url, repo.owner, repo.repo, hash
        );

        let resp = self
            .get(repo, &url, "application/vnd.github.diff")
            .send()
            .await
            .with_context(|| format!("Failed to fetch diff of {hash}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Diff API returned {status} for {hash}");
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read diff body of {hash}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_entry_parses_dir_kind() {
        let json = r#"{"name":"src","path":"src","type":"dir"}"#;
        let entry: ContentsEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, "dir");
        assert_eq!(entry.path, "src");
    }

    #[test]
    fn test_commit_entry_tolerates_missing_author() {
        // Commits from deleted accounts come back with author: null
        let json = r#"{
            "sha": "abc123",
            "commit": {"message": "fix build", "author": {"name": "Jo", "date": "2024-05-01T12:00:00Z"}},
            "author": null
        }"#;
        let entry: CommitEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.sha, "abc123");
        assert!(entry.author.is_none());
    }

    #[test]
    fn test_api_url_trailing_slash_is_trimmed() {
        let config = RepoSourceConfig {
            api_url: "https://api.github.com/".to_string(),
            token: None,
            walker_concurrency: 5,
        };
        let source = GithubSource::new(reqwest::Client::new(), &config);
        assert_eq!(source.api_url, "https://api.github.com");
    }
}
