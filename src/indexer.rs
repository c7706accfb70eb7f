//! Indexing orchestrator: walk → summarize → embed → persist.

use anyhow::Result;
use chrono::Utc;
use futures_util::future;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{self, LanguageModel};
use crate::models::SourceFileEmbedding;
use crate::source::{walker, RepoFile, RepoRef, RepoSource};
use crate::store::embeddings::EmbeddingStore;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Files summarized/embedded concurrently per batch
    pub batch_size: usize,
    /// Pause between batches to stay under provider rate limits
    pub batch_delay: Duration,
    /// Concurrent file downloads during the walk
    pub walker_concurrency: usize,
}

impl IndexOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.indexing.batch_size,
            batch_delay: config.batch_delay(),
            walker_concurrency: config.repo_source.walker_concurrency,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexOutcome {
    /// Files the walk produced
    pub files_found: usize,
    /// Rows actually persisted; the credit decrement uses this
    pub files_indexed: u64,
}

/// Drive the full indexing pipeline for one repository. Per-file trouble
/// (summarization, embedding, or persistence) is logged and drops that file
/// only; a failure to walk the repository at all is fatal to the run.
pub async fn index_repository(
    source: &dyn RepoSource,
    llm: &dyn LanguageModel,
    store: &EmbeddingStore,
    project_id: Uuid,
    repo: &RepoRef,
    opts: &IndexOptions,
) -> Result<IndexOutcome> {
    let files = walker::walk_files(source, repo, opts.walker_concurrency).await?;
    let files_found = files.len();

    let batch_size = opts.batch_size.max(1);
    let total_batches = files.len().div_ceil(batch_size);
    let mut produced = Vec::new();

    for (batch_no, batch) in files.chunks(batch_size).enumerate() {
        tracing::info!("Processing batch {} of {total_batches}", batch_no + 1);

        let results = future::join_all(batch.iter().map(|file| process_file(llm, file))).await;
        produced.extend(results.into_iter().flatten());

        let done = (batch_no + 1) * batch_size;
        if done < files.len() {
            tokio::time::sleep(opts.batch_delay).await;
        }
    }

    // Settle-all persistence: count successes, never abort siblings
    let mut files_indexed = 0u64;
    for (file, summary, embedding) in produced {
        let row = SourceFileEmbedding {
            id: Uuid::new_v4(),
            project_id,
            file_path: file.path,
            source_code: file.content,
            summary,
            embedding,
            created_at: Utc::now(),
        };
        let path = row.file_path.clone();
        match store.add_row(row) {
            Ok(()) => files_indexed += 1,
            Err(e) => tracing::warn!("Failed to persist {path}: {e:#}"),
        }
    }

    tracing::info!("Indexed {files_indexed} of {files_found} files for project {project_id}");
    Ok(IndexOutcome {
        files_found,
        files_indexed,
    })
}

/// Summarize and embed one file. Any model failure drops the file from the
/// run rather than failing its batch.
async fn process_file(
    llm: &dyn LanguageModel,
    file: &RepoFile,
) -> Option<(RepoFile, String, Vec<f32>)> {
    let summary = match llm::summarize_file(llm, &file.path, &file.content).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("Failed to summarize {}: {e:#}", file.path);
            return None;
        }
    };

    let embedding = match llm::embed_text(llm, &summary).await {
        Ok(embedding) => embedding,
        Err(e) => {
            tracing::warn!("Failed to embed summary of {}: {e:#}", file.path);
            return None;
        }
    };

    Some((file.clone(), summary, embedding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    use crate::llm::{LlmError, TextStream};
    use crate::source::{CommitInfo, EntryKind, TreeEntry};

    /// Flat single-directory repository with a configurable file count.
    struct FlatSource {
        files: Vec<String>,
    }

    #[async_trait]
    impl RepoSource for FlatSource {
        async fn list_dir(&self, _repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>> {
            assert!(path.is_empty());
            Ok(self
                .files
                .iter()
                .map(|name| TreeEntry {
                    path: name.clone(),
                    name: name.clone(),
                    kind: EntryKind::File,
                })
                .collect())
        }

        async fn fetch_file(&self, _repo: &RepoRef, path: &str) -> Result<String> {
            Ok(format!("// contents of {path}"))
        }

        async fn list_commits(&self, _repo: &RepoRef) -> Result<Vec<CommitInfo>> {
            Ok(Vec::new())
        }

        async fn fetch_diff(&self, _repo: &RepoRef, _hash: &str) -> Result<String> {
            anyhow::bail!("no diffs here")
        }
    }

    /// Deterministic model whose summarization fails for chosen paths.
    struct ScriptedModel {
        failing_summaries: HashSet<String>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
            for path in &self.failing_summaries {
                if prompt.contains(path.as_str()) {
                    return Err(LlmError::Provider(anyhow::anyhow!(
                        "simulated failure for {path}"
                    )));
                }
            }
            Ok("a short summary".to_string())
        }

        async fn stream_text(&self, _prompt: &str) -> Result<TextStream, LlmError> {
            Err(LlmError::Provider(anyhow::anyhow!("not streaming in tests")))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".to_string(),
            repo: "demo".to_string(),
            token: None,
        }
    }

    fn options() -> IndexOptions {
        IndexOptions {
            batch_size: 2,
            batch_delay: Duration::from_secs(5),
            walker_concurrency: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_file_does_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open_or_create(dir.path()).unwrap();
        let source = FlatSource {
            files: (1..=5).map(|i| format!("file{i}.rs")).collect(),
        };
        let llm = ScriptedModel {
            failing_summaries: HashSet::from(["file3.rs".to_string()]),
        };
        let project_id = Uuid::new_v4();

        let outcome = index_repository(&source, &llm, &store, project_id, &repo(), &options())
            .await
            .unwrap();

        assert_eq!(outcome.files_found, 5);
        assert_eq!(outcome.files_indexed, 4);
        assert_eq!(store.count_for_project(project_id), 4);

        let hits = store.search(project_id, &[1.0, 0.0, 0.0], 0.5, 10);
        assert!(hits.iter().all(|h| h.file_path != "file3.rs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_files_indexed_when_nothing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open_or_create(dir.path()).unwrap();
        let source = FlatSource {
            files: (1..=5).map(|i| format!("file{i}.rs")).collect(),
        };
        let llm = ScriptedModel {
            failing_summaries: HashSet::new(),
        };
        let project_id = Uuid::new_v4();

        let outcome = index_repository(&source, &llm, &store, project_id, &repo(), &options())
            .await
            .unwrap();

        assert_eq!(outcome.files_indexed, 5);
        // Source and summary are captured on the row
        let hits = store.search(project_id, &[1.0, 0.0, 0.0], 0.5, 10);
        assert!(hits.iter().any(|h| h.source_code.contains("file1.rs")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_repository_indexes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open_or_create(dir.path()).unwrap();
        let source = FlatSource { files: Vec::new() };
        let llm = ScriptedModel {
            failing_summaries: HashSet::new(),
        };

        let outcome =
            index_repository(&source, &llm, &store, Uuid::new_v4(), &repo(), &options())
                .await
                .unwrap();
        assert_eq!(outcome.files_found, 0);
        assert_eq!(outcome.files_indexed, 0);
    }
}
