use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{CheckCreditsRequest, CheckCreditsResponse, CreateProjectRequest, Project};
use crate::project;
use crate::state::AppState;

/// POST /api/projects - Create a project and run the full setup pipeline.
/// Credit and URL validation happen before any row is written.
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Project name is required".to_string()));
    }

    let project = project::create_project(
        &state.db,
        &state.embeddings,
        state.source.as_ref(),
        state.llm.as_ref(),
        &state.config,
        req,
    )
    .await
    .map_err(Error::into_http)?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// POST /api/projects/check-credits - Pre-flight file count vs. balance
pub async fn check_credits(
    State(state): State<AppState>,
    Json(req): Json<CheckCreditsRequest>,
) -> Result<Json<CheckCreditsResponse>, (StatusCode, String)> {
    let response = project::check_credits(&state.db, state.source.as_ref(), &state.config, req)
        .await
        .map_err(Error::into_http)?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// GET /api/projects?user_id=... - Non-archived projects for a user
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Vec<Project>> {
    Json(state.db.list_projects(&query.user_id))
}

/// DELETE /api/projects/{id} - Archive (soft delete); rows remain
pub async fn archive_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, (StatusCode, String)> {
    let project = state.db.archive_project(id).map_err(Error::into_http)?;
    Ok(Json(project))
}

/// Balance response for the credits endpoint
#[derive(serde::Serialize)]
pub struct CreditsResponse {
    pub credits: u64,
}

/// GET /api/users/{id}/credits - Current balance (bootstraps on first sight)
pub async fn get_user_credits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<CreditsResponse> {
    let user = state.db.ensure_user(&user_id, state.config.initial_credits);
    Json(CreditsResponse {
        credits: user.credits,
    })
}
