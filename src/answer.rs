//! Retrieval & answer engine: embed the question, search the project's
//! embeddings, and stream a context-constrained answer.

use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::Error;
use crate::llm::{self, prompts, retry, LanguageModel, TextStream};
use crate::models::FileReference;
use crate::store::embeddings::EmbeddingStore;

/// A streaming answer plus the files it was grounded on. The stream is
/// single-consumer and cancel-aware: dropping it tears down the provider
/// request without a retry.
pub struct Answer {
    pub stream: TextStream,
    pub file_references: Vec<FileReference>,
}

/// Answer a free-text question about one project's codebase.
pub async fn ask_question(
    llm: &dyn LanguageModel,
    store: &EmbeddingStore,
    project_id: Uuid,
    question: &str,
    retrieval: &RetrievalConfig,
) -> Result<Answer, Error> {
    let query_embedding = llm::embed_text(llm, question).await?;

    let file_references = store.search(
        project_id,
        &query_embedding,
        retrieval.similarity_threshold,
        retrieval.context_limit,
    );
    tracing::info!(
        "Retrieved {} context files for project {project_id}",
        file_references.len()
    );

    let context_block = prompts::build_context_block(&file_references);
    let prompt = prompts::answer_question(&context_block, question);

    let stream = retry::with_backoff("answer", || llm.stream_text(&prompt)).await?;

    Ok(Answer {
        stream,
        file_references,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures_util::StreamExt;

    use crate::llm::LlmError;
    use crate::models::SourceFileEmbedding;

    /// Embeds every text to a fixed direction and streams a canned answer.
    struct CannedModel;

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn generate_text(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok("unused".to_string())
        }

        async fn stream_text(&self, prompt: &str) -> Result<TextStream, LlmError> {
            // Echo a marker so tests can assert the context made it in
            let grounded = prompt.contains("source: src/auth.rs");
            let deltas = vec![
                Ok("Auth works ".to_string()),
                Ok(if grounded { "from context" } else { "from thin air" }.to_string()),
            ];
            Ok(Box::pin(futures_util::stream::iter(deltas)))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn row(project_id: Uuid, path: &str, embedding: Vec<f32>) -> SourceFileEmbedding {
        SourceFileEmbedding {
            id: Uuid::new_v4(),
            project_id,
            file_path: path.to_string(),
            source_code: format!("// {path}"),
            summary: format!("summary of {path}"),
            embedding,
            created_at: Utc::now(),
        }
    }

    fn retrieval() -> RetrievalConfig {
        RetrievalConfig {
            similarity_threshold: 0.5,
            context_limit: 10,
        }
    }

    #[tokio::test]
    async fn test_answer_cites_matching_files_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open_or_create(dir.path()).unwrap();
        let project = Uuid::new_v4();
        store.add_row(row(project, "src/auth.rs", vec![1.0, 0.0])).unwrap();
        store.add_row(row(project, "src/far.rs", vec![0.0, 1.0])).unwrap();

        let answer = ask_question(&CannedModel, &store, project, "how does auth work?", &retrieval())
            .await
            .unwrap();

        assert_eq!(answer.file_references.len(), 1);
        assert_eq!(answer.file_references[0].file_path, "src/auth.rs");

        let text: String = answer
            .stream
            .filter_map(|d| async { d.ok() })
            .collect()
            .await;
        assert_eq!(text, "Auth works from context");
    }

    #[tokio::test]
    async fn test_answer_ignores_other_projects_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open_or_create(dir.path()).unwrap();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        store.add_row(row(theirs, "src/auth.rs", vec![1.0, 0.0])).unwrap();

        let answer = ask_question(&CannedModel, &store, mine, "how does auth work?", &retrieval())
            .await
            .unwrap();
        assert!(answer.file_references.is_empty());
    }
}
