use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::llm::{LanguageModel, LlmError, TextStream};

/// Maximum characters sent per embedding input. Embedding models carry a
/// context window of a few thousand tokens; dense content (JSON blobs,
/// minified sources) can tokenize at well over 2 tokens per character, so
/// the prefix is kept conservative.
const MAX_EMBED_CHARS: usize = 3_000;

/// Generation requests get a long timeout; answers stream slowly on local
/// providers.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// [`LanguageModel`] implementation over an Ollama or OpenAI-compatible
/// HTTP API. A 429 from the provider is surfaced as
/// [`LlmError::RateLimited`] so the shared backoff policy can retry it.
pub struct HttpLanguageModel {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLanguageModel {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_key.as_deref().unwrap_or(""))
    }
}

/// Distinguish the retryable rate-limit condition from other provider
/// failures, consuming the response body for the error message.
async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Provider(anyhow!("{what} returned {status}: {body}")))
}

fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<WireMessage> {
    vec![WireMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: WireMessage,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: WireMessage,
    done: bool,
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask the provider to truncate overlong inputs instead of erroring
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

// ─── Trait implementation ────────────────────────────────

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        match self.config.provider.as_str() {
            "ollama" => self.generate_ollama(prompt).await,
            "openai" => self.generate_openai(prompt).await,
            other => Err(LlmError::Provider(anyhow!("Unknown LLM provider: {other}"))),
        }
    }

    async fn stream_text(&self, prompt: &str) -> Result<TextStream, LlmError> {
        match self.config.provider.as_str() {
            "ollama" => self.stream_ollama(prompt).await,
            "openai" => self.stream_openai(prompt).await,
            other => Err(LlmError::Provider(anyhow!("Unknown LLM provider: {other}"))),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        match self.config.provider.as_str() {
            "ollama" => self.embed_ollama(text).await,
            "openai" => self.embed_openai(text).await,
            other => Err(LlmError::Provider(anyhow!("Unknown LLM provider: {other}"))),
        }
    }
}

impl HttpLanguageModel {
    // ─── Ollama ──────────────────────────────────────────

    async fn generate_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let req = OllamaChatRequest {
            model: self.config.chat_model.clone(),
            messages: user_message(prompt),
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(GENERATION_TIMEOUT)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama chat API")?;
        let resp = ensure_success(resp, "Ollama chat API").await?;

        let body: OllamaChatResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;
        Ok(body.message.content)
    }

    async fn stream_ollama(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let req = OllamaChatRequest {
            model: self.config.chat_model.clone(),
            messages: user_message(prompt),
            stream: true,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(GENERATION_TIMEOUT)
            .json(&req)
            .send()
            .await
            .context("Failed to connect to Ollama for streaming")?;
        let resp = ensure_success(resp, "Ollama chat API").await?;

        let stream = stream_lines(resp.bytes_stream()).filter_map(|line| async move {
            match line {
                Ok(line) => parse_ollama_line(&line),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(stream))
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/api/embed", self.config.base_url);
        let req = OllamaEmbedRequest {
            model: self.config.embedding_model.clone(),
            input: vec![truncate_for_embedding(text).to_string()],
            truncate: true,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama embed API")?;
        let resp = ensure_success(resp, "Ollama embed API").await?;

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama embed response")?;
        body.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Provider(anyhow!("No embedding returned")))
    }

    // ─── OpenAI-compatible ───────────────────────────────

    async fn generate_openai(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let req = OpenAiChatRequest {
            model: self.config.chat_model.clone(),
            messages: user_message(prompt),
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(GENERATION_TIMEOUT)
            .header("Authorization", self.bearer())
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI chat API")?;
        let resp = ensure_success(resp, "OpenAI chat API").await?;

        let body: OpenAiChatResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI chat response")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Provider(anyhow!("No completion choice returned")))
    }

    async fn stream_openai(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let req = OpenAiChatRequest {
            model: self.config.chat_model.clone(),
            messages: user_message(prompt),
            stream: true,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(GENERATION_TIMEOUT)
            .header("Authorization", self.bearer())
            .json(&req)
            .send()
            .await
            .context("Failed to connect to OpenAI for streaming")?;
        let resp = ensure_success(resp, "OpenAI chat API").await?;

        let stream = stream_lines(resp.bytes_stream()).filter_map(|line| async move {
            match line {
                Ok(line) => parse_openai_line(&line),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(stream))
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let req = OpenAiEmbedRequest {
            model: self.config.embedding_model.clone(),
            input: vec![truncate_for_embedding(text).to_string()],
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI embed API")?;
        let resp = ensure_success(resp, "OpenAI embed API").await?;

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI embed response")?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Provider(anyhow!("No embedding returned")))
    }
}

// ─── Stream parsing ──────────────────────────────────────

/// Parse one Ollama streaming line: `Some(Ok(delta))` for content,
/// `Some(Err(_))` for parse errors, `None` to skip (done marker, empties).
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(chunk) => {
            if chunk.done || chunk.message.content.is_empty() {
                return None;
            }
            Some(Ok(chunk.message.content))
        }
        Err(e) => Some(Err(anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

/// Parse one OpenAI SSE line; non-`data:` lines, `[DONE]`, and role-only
/// chunks are skipped.
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    let data = line.strip_prefix("data: ")?.trim();
    if data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default();
            if content.is_empty() {
                return None;
            }
            Some(Ok(content))
        }
        Err(e) => Some(Err(anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

/// Convert a byte stream into a stream of complete lines, buffering
/// partial lines across chunk boundaries.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].to_string();
                    buffer = buffer[newline + 1..].to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((Err(anyhow!("Stream read error: {e}")), (stream, buffer)));
                    }
                    None => {
                        if !buffer.trim().is_empty() {
                            let rest = std::mem::take(&mut buffer);
                            return Some((Ok(rest), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
