//! Repository source collaborator: listing, file fetching, commit history.
//!
//! The [`RepoSource`] trait is the seam for tests; [`github::GithubSource`]
//! is the production implementation over the hosting REST API.

pub mod github;
pub mod walker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;

/// An owner + repository pair decomposed from a repository URL, plus the
/// transient access token used for private repositories.
#[derive(Debug, Clone)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub token: Option<String>,
}

impl RepoRef {
    /// Decompose a repository URL into owner + repo. The last two path
    /// segments carry the pair; a trailing `.git` is stripped.
    pub fn parse(url: &str, token: Option<&str>) -> Result<Self, Error> {
        let invalid = || Error::InvalidRepositoryReference(url.to_string());

        let trimmed = url.trim().trim_end_matches('/');
        if !trimmed.starts_with("https://") && !trimmed.starts_with("http://") {
            return Err(invalid());
        }

        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(invalid)?;

        let segments: Vec<&str> = without_scheme.split('/').filter(|s| !s.is_empty()).collect();
        // host + owner + repo at minimum
        if segments.len() < 3 {
            return Err(invalid());
        }

        let owner = segments[segments.len() - 2];
        let repo = segments[segments.len() - 1].trim_end_matches(".git");
        if owner.is_empty() || repo.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.map(|t| t.to_string()),
        })
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Path relative to the repository root
    pub path: String,
    /// Bare file or directory name
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Commit metadata as returned by the hosting API
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author_name: String,
    pub author_avatar: String,
    pub date: DateTime<Utc>,
}

/// A file pulled out of a repository walk
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

/// The repository hosting collaborator. All methods suspend on network I/O;
/// implementations must not retry internally (the walker and ingestor own
/// their failure policies).
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// List the immediate entries of a directory (`""` for the root).
    async fn list_dir(&self, repo: &RepoRef, path: &str) -> anyhow::Result<Vec<TreeEntry>>;

    /// Fetch one file's content as text.
    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> anyhow::Result<String>;

    /// List recent commits, newest first.
    async fn list_commits(&self, repo: &RepoRef) -> anyhow::Result<Vec<CommitInfo>>;

    /// Fetch one commit's diff as unified patch text.
    async fn fetch_diff(&self, repo: &RepoRef, hash: &str) -> anyhow::Result<String>;
}
