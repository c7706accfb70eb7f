use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::ingest;
use crate::models::Commit;
use crate::state::AppState;

/// GET /api/projects/{id}/commits - List summarized commits, newest first.
/// Triggers an incremental ingest in the background as a side effect; the
/// response returns what is persisted right now.
pub async fn get_commits(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Commit>>, (StatusCode, String)> {
    if state.db.find_project(project_id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Project not found".to_string()));
    }

    let background = state.clone();
    tokio::spawn(async move {
        let commit_limit = background.config.indexing.commit_limit;
        if let Err(e) = ingest::pull_commits(
            &background.db,
            background.source.as_ref(),
            background.llm.as_ref(),
            project_id,
            None,
            commit_limit,
        )
        .await
        {
            tracing::error!("Failed to pull commits for {project_id}: {e}");
        }
    });

    Ok(Json(state.db.commits_for_project(project_id)))
}
