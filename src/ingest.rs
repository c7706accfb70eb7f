//! Incremental commit ingestor: fetch → diff against persisted hashes →
//! summarize new commits → bulk insert.

use futures_util::future;
use uuid::Uuid;

use crate::error::Error;
use crate::llm::{self, LanguageModel};
use crate::models::Commit;
use crate::source::{CommitInfo, RepoRef, RepoSource};
use crate::store::Database;

/// Pull and summarize commits not yet recorded for this project. Safe to
/// re-trigger: with nothing new the call is a read-only no-op returning 0.
/// Individual commit summarization failures are captured as empty summaries
/// and never block the rest of the batch.
pub async fn pull_commits(
    db: &Database,
    source: &dyn RepoSource,
    llm: &dyn LanguageModel,
    project_id: Uuid,
    access_token: Option<&str>,
    commit_limit: usize,
) -> Result<usize, Error> {
    let project = db.find_project(project_id).ok_or(Error::ProjectNotFound)?;
    let repo = RepoRef::parse(&project.repo_url, access_token)
        .map_err(|_| Error::CommitSourceMissing)?;

    let mut commits = source
        .list_commits(&repo)
        .await
        .map_err(Error::ExternalService)?;
    commits.sort_by(|a, b| b.date.cmp(&a.date));
    commits.truncate(commit_limit);

    let seen = db.commit_hashes(project_id);
    let unprocessed: Vec<CommitInfo> = commits
        .into_iter()
        .filter(|c| !seen.contains(&c.hash))
        .collect();

    if unprocessed.is_empty() {
        tracing::debug!("No new commits for project {project_id}");
        return Ok(0);
    }

    tracing::info!(
        "Summarizing {} new commits for project {project_id}",
        unprocessed.len()
    );

    let summaries = future::join_all(
        unprocessed
            .iter()
            .map(|c| summarize_commit(source, llm, &repo, &c.hash)),
    )
    .await;

    let rows: Vec<Commit> = unprocessed
        .into_iter()
        .zip(summaries)
        .map(|(info, summary)| Commit {
            id: Uuid::new_v4(),
            project_id,
            commit_hash: info.hash,
            message: info.message,
            author_name: info.author_name,
            author_avatar: info.author_avatar,
            commit_date: info.date,
            summary,
        })
        .collect();

    Ok(db.insert_commits(rows))
}

/// Best-effort summary of one commit's diff. Any failure (diff fetch or
/// generation) yields an empty summary so the commit is still recorded.
async fn summarize_commit(
    source: &dyn RepoSource,
    llm: &dyn LanguageModel,
    repo: &RepoRef,
    hash: &str,
) -> String {
    let diff = match source.fetch_diff(repo, hash).await {
        Ok(diff) => diff,
        Err(e) => {
            tracing::warn!("Failed to fetch diff of {hash}: {e:#}");
            return String::new();
        }
    };

    match llm::summarize_diff(llm, &diff).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("Failed to summarize commit {hash}: {e:#}");
            String::new()
        }
    }
}
