use axum::routing::{delete, get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use repo_qa::api;
use repo_qa::config::Config;
use repo_qa::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "LLM provider: {} ({})",
        config.llm.provider,
        config.llm.base_url
    );
    tracing::info!("Repository source: {}", config.repo_source.api_url);

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/projects", post(api::projects::create_project))
        .route("/api/projects", get(api::projects::list_projects))
        .route(
            "/api/projects/check-credits",
            post(api::projects::check_credits),
        )
        .route("/api/projects/{id}", delete(api::projects::archive_project))
        .route("/api/projects/{id}/commits", get(api::commits::get_commits))
        .route(
            "/api/projects/{id}/questions",
            get(api::questions::list_questions),
        )
        .route("/api/questions", post(api::questions::save_answer))
        .route("/api/ask", post(api::questions::ask))
        .route(
            "/api/users/{id}/credits",
            get(api::projects::get_user_credits),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
