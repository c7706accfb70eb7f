use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::stream::{self, Stream, StreamExt};
use uuid::Uuid;

use crate::answer::ask_question;
use crate::error::Error;
use crate::llm::prompts::truncate_to_char_boundary;
use crate::models::{AskRequest, Question, SaveAnswerRequest};
use crate::state::AppState;

const MAX_QUESTION_LEN: usize = 2000;
const IDLE_TIMEOUT_SECS: u64 = 30;

/// POST /api/ask - Answer a question about one project over SSE.
///
/// Event order: one `context` event carrying the cited file references,
/// then `delta` events with answer fragments, then `done`. Closing the
/// response drops the provider stream without a retry.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question is required".to_string()));
    }
    let question = truncate_to_char_boundary(question, MAX_QUESTION_LEN).to_string();

    if state.db.find_project(req.project_id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Project not found".to_string()));
    }

    let _permit = state
        .ask_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Question service at capacity".to_string(),
            )
        })?;

    let answer = ask_question(
        state.llm.as_ref(),
        &state.embeddings,
        req.project_id,
        &question,
        &state.config.retrieval,
    )
    .await
    .map_err(Error::into_http)?;

    let context_event = Event::default()
        .event("context")
        .json_data(serde_json::json!({ "file_references": answer.file_references }))
        .unwrap();

    // Pull deltas with an idle timeout so a stalled provider cannot hold
    // the connection open forever. A `None` state stops the stream after
    // an error event.
    let idle_timeout = Duration::from_secs(IDLE_TIMEOUT_SECS);
    let delta_stream = stream::unfold(
        (Some(answer.stream), idle_timeout),
        |(maybe_stream, timeout)| async move {
            let mut llm_stream = maybe_stream?;
            match tokio::time::timeout(timeout, llm_stream.next()).await {
                Ok(Some(Ok(content))) => {
                    let event: Result<Event, Infallible> = Ok(Event::default()
                        .event("delta")
                        .json_data(serde_json::json!({ "content": content }))
                        .unwrap());
                    Some((event, (Some(llm_stream), timeout)))
                }
                Ok(Some(Err(e))) => {
                    let event: Result<Event, Infallible> = Ok(Event::default()
                        .event("error")
                        .json_data(serde_json::json!({ "message": e.to_string() }))
                        .unwrap());
                    Some((event, (None, timeout)))
                }
                Ok(None) => None,
                Err(_) => {
                    let event: Result<Event, Infallible> = Ok(Event::default()
                        .event("error")
                        .json_data(
                            serde_json::json!({ "message": "Answer stream timed out (idle)" }),
                        )
                        .unwrap());
                    Some((event, (None, timeout)))
                }
            }
        },
    );

    let done_event: Result<Event, Infallible> = Ok(Event::default()
        .event("done")
        .json_data(serde_json::json!({}))
        .unwrap());

    let event_stream = stream::once(async move { Ok(context_event) })
        .chain(delta_stream)
        .chain(stream::once(async move { done_event }));

    // Hold the semaphore permit for the lifetime of the stream
    let event_stream = event_stream.map(move |event| {
        let _permit = &_permit;
        event
    });

    Ok(Sse::new(event_stream))
}

/// POST /api/questions - Save a question/answer pair with its file-reference
/// snapshot.
pub async fn save_answer(
    State(state): State<AppState>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<(StatusCode, Json<Question>), (StatusCode, String)> {
    if state.db.find_project(req.project_id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Project not found".to_string()));
    }

    let question = Question {
        id: Uuid::new_v4(),
        project_id: req.project_id,
        user_id: req.user_id,
        question: req.question,
        answer: req.answer,
        file_references: req.file_references,
        created_at: Utc::now(),
    };
    state.db.insert_question(question.clone());

    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/projects/{id}/questions - Saved questions, newest first
pub async fn list_questions(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Question>>, (StatusCode, String)> {
    if state.db.find_project(project_id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Project not found".to_string()));
    }
    Ok(Json(state.db.questions_for_project(project_id)))
}
