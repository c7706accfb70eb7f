//! Project lifecycle: pre-flight credit check and full project setup.

use crate::config::Config;
use crate::error::Error;
use crate::indexer::{self, IndexOptions};
use crate::ingest;
use crate::llm::LanguageModel;
use crate::models::{CheckCreditsRequest, CheckCreditsResponse, CreateProjectRequest, Project};
use crate::source::{walker, RepoRef, RepoSource};
use crate::store::embeddings::EmbeddingStore;
use crate::store::Database;

/// Pre-flight: how many files would be indexed, against the user's balance.
/// No side effects beyond first-sight user bootstrap.
pub async fn check_credits(
    db: &Database,
    source: &dyn RepoSource,
    config: &Config,
    req: CheckCreditsRequest,
) -> Result<CheckCreditsResponse, Error> {
    let repo = RepoRef::parse(&req.repo_url, req.access_token.as_deref())?;
    let file_count = walker::count_files(source, &repo)
        .await
        .map_err(Error::ExternalService)?;
    let user = db.ensure_user(&req.user_id, config.initial_credits);

    Ok(CheckCreditsResponse {
        file_count,
        user_credits: user.credits,
    })
}

/// Create a project and run the full setup pipeline: credit pre-flight,
/// project row, concurrent index + commit ingest, then the credit
/// decrement by the count actually indexed.
///
/// `InvalidRepositoryReference` and `InsufficientCredits` surface before
/// any row is written.
pub async fn create_project(
    db: &Database,
    embeddings: &EmbeddingStore,
    source: &dyn RepoSource,
    llm: &dyn LanguageModel,
    config: &Config,
    req: CreateProjectRequest,
) -> Result<Project, Error> {
    let repo = RepoRef::parse(&req.repo_url, req.access_token.as_deref())?;

    let user = db.ensure_user(&req.user_id, config.initial_credits);
    let file_count = walker::count_files(source, &repo)
        .await
        .map_err(Error::ExternalService)?;

    if user.credits < file_count {
        return Err(Error::InsufficientCredits {
            required: file_count,
            available: user.credits,
        });
    }

    let project = db.create_project(&req.name, &req.repo_url, &req.user_id);
    tracing::info!(
        "Setting up project {} ({}) with {file_count} files",
        project.name,
        project.id
    );

    let opts = IndexOptions::from_config(config);
    let (index_result, ingest_result) = tokio::join!(
        indexer::index_repository(source, llm, embeddings, project.id, &repo, &opts),
        ingest::pull_commits(
            db,
            source,
            llm,
            project.id,
            req.access_token.as_deref(),
            config.indexing.commit_limit,
        ),
    );

    let outcome = index_result.map_err(Error::ExternalService)?;
    ingest_result?;

    db.decrement_credits(&req.user_id, outcome.files_indexed)?;
    tracing::info!(
        "Project {} ready: indexed {} of {} files",
        project.name,
        outcome.files_indexed,
        outcome.files_found
    );

    Ok(project)
}
