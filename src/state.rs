use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::http::HttpLanguageModel;
use crate::llm::LanguageModel;
use crate::source::github::GithubSource;
use crate::source::RepoSource;
use crate::store::embeddings::EmbeddingStore;
use crate::store::Database;

/// Shared application state. Collaborators are constructed here and
/// injected everywhere else, so tests can substitute their own.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub embeddings: Arc<EmbeddingStore>,
    pub source: Arc<dyn RepoSource>,
    pub llm: Arc<dyn LanguageModel>,
    pub ask_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db = Arc::new(Database::open_or_create(&config.data_dir)?);
        let embeddings = Arc::new(EmbeddingStore::open_or_create(&config.embeddings_dir())?);

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("repo-qa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let source: Arc<dyn RepoSource> = Arc::new(GithubSource::new(
            http_client.clone(),
            &config.repo_source,
        ));
        let llm: Arc<dyn LanguageModel> =
            Arc::new(HttpLanguageModel::new(http_client, config.llm.clone()));

        let ask_semaphore = Arc::new(tokio::sync::Semaphore::new(config.max_concurrent_asks));

        Ok(Self {
            config,
            db,
            embeddings,
            source,
            llm,
            ask_semaphore,
        })
    }
}
