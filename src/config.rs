use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the database file and embedding store are kept
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Repository hosting API configuration
    pub repo_source: RepoSourceConfig,
    /// Indexing pipeline knobs
    pub indexing: IndexingConfig,
    /// Retrieval knobs for question answering
    pub retrieval: RetrievalConfig,
    /// Credits granted to a user on first sight
    pub initial_credits: u64,
    /// Maximum questions answered concurrently
    pub max_concurrent_asks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for summaries and answers
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSourceConfig {
    /// Base URL of the hosting REST API
    pub api_url: String,
    /// Fallback access token for repositories whose project was created
    /// without a per-request token
    pub token: Option<String>,
    /// Concurrent file downloads during a walk
    pub walker_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Files summarized/embedded concurrently per batch
    pub batch_size: usize,
    /// Pause between batches to stay under provider rate limits
    pub batch_delay_secs: u64,
    /// Commits retained per ingest run (newest first)
    pub commit_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a file to be used as context
    pub similarity_threshold: f32,
    /// Maximum files included in the context block
    pub context_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            llm: LlmConfig::default(),
            repo_source: RepoSourceConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            initial_credits: 150,
            max_concurrent_asks: 3,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for RepoSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
            walker_concurrency: 5,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_delay_secs: 5,
            commit_limit: 15,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            context_limit: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("REPO_QA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("REPO_QA_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(url) = std::env::var("REPO_QA_SOURCE_API_URL") {
            config.repo_source.api_url = url;
        }
        if let Ok(token) = std::env::var("REPO_QA_SOURCE_TOKEN") {
            config.repo_source.token = Some(token);
        }
        if let Ok(val) = std::env::var("REPO_QA_WALKER_CONCURRENCY") {
            if let Ok(v) = val.parse() {
                config.repo_source.walker_concurrency = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.indexing.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_BATCH_DELAY_SECS") {
            if let Ok(v) = val.parse() {
                config.indexing.batch_delay_secs = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_COMMIT_LIMIT") {
            if let Ok(v) = val.parse() {
                config.indexing.commit_limit = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_SIMILARITY_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.retrieval.similarity_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_CONTEXT_LIMIT") {
            if let Ok(v) = val.parse() {
                config.retrieval.context_limit = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_INITIAL_CREDITS") {
            if let Ok(v) = val.parse() {
                config.initial_credits = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_MAX_CONCURRENT_ASKS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_asks = v;
            }
        }

        config
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.indexing.batch_delay_secs)
    }
}
