//! Language-model collaborator: text generation, streaming, embeddings.
//!
//! [`LanguageModel`] is the seam for tests; [`http::HttpLanguageModel`]
//! speaks the Ollama and OpenAI-compatible wire formats. The higher-level
//! [`summarize_file`] / [`embed_text`] helpers bolt the shared
//! retry-with-backoff policy onto the raw trait calls.

pub mod http;
pub mod prompts;
pub mod retry;

use async_trait::async_trait;
use futures_util::stream::Stream;
use std::pin::Pin;

/// Incremental text deltas from a streaming generation. Dropping the stream
/// cancels the underlying request; the provider call is never retried once
/// tokens start flowing.
pub type TextStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// Model provider failures. `RateLimited` is the one transient condition the
/// retry policy acts on; everything else fails immediately.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited by the model provider")]
    RateLimited,
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// The generative-model collaborator
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete text response for a prompt.
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Stream a text response as deltas.
    async fn stream_text(&self, prompt: &str) -> Result<TextStream, LlmError>;

    /// Convert text into a fixed-length embedding vector. File summaries and
    /// live questions go through the same method, which keeps them
    /// comparable in embedding space.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Produce a short natural-language summary of one source file, retrying on
/// rate limits. An empty generation falls back to a deterministic
/// placeholder derived from the path; a hard failure propagates so the
/// orchestrator can drop the file without aborting its batch.
pub async fn summarize_file(
    llm: &dyn LanguageModel,
    path: &str,
    content: &str,
) -> Result<String, LlmError> {
    let prompt = prompts::summarize_file(path, content);
    let text = retry::with_backoff("summarize", || llm.generate_text(&prompt)).await?;
    let text = text.trim();
    if text.is_empty() {
        Ok(prompts::fallback_summary(path))
    } else {
        Ok(text.to_string())
    }
}

/// Embed arbitrary text, retrying on rate limits.
pub async fn embed_text(llm: &dyn LanguageModel, text: &str) -> Result<Vec<f32>, LlmError> {
    retry::with_backoff("embed", || llm.embed(text)).await
}

/// Summarize one commit diff, retrying on rate limits.
pub async fn summarize_diff(llm: &dyn LanguageModel, diff: &str) -> Result<String, LlmError> {
    let prompt = prompts::commit_summary(diff);
    retry::with_backoff("commit summary", || llm.generate_text(&prompt)).await
}
