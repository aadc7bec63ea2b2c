//! Session lifecycle endpoints.

use agentfs_common::{ApiError, SessionView};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state.sessions.create().await;
    tracing::info!(session_id = %session.core().id, "session created");
    Ok((StatusCode::CREATED, Json(session.core().to_view().await)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(session.core().to_view().await))
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
    pub count: usize,
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.sessions.list().await;
    let mut views = Vec::with_capacity(sessions.len());
    for session in &sessions {
        views.push(session.core().to_view().await);
    }
    let count = views.len();
    Json(SessionListResponse { sessions: views, count })
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.delete(&id).await?;
    tracing::info!(session_id = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SetWorkingDirRequest {
    pub working_directory: String,
}

pub async fn set_working_dir(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetWorkingDirRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let path = agentfs_common::util::expand_tilde(&req.working_directory);

    if !path.is_absolute() {
        return Err(ApiError::invalid_argument("working directory must be absolute"));
    }
    let metadata = std::fs::metadata(&path)
        .map_err(|_| ApiError::invalid_argument(format!("{} does not exist", path.display())))?;
    if !metadata.is_dir() {
        return Err(ApiError::invalid_argument(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    let canonical = std::fs::canonicalize(&path)
        .map_err(|e| ApiError::invalid_argument(format!("failed to canonicalize path: {e}")))?;

    session.core().set_working_dir(canonical).await;
    session
        .core()
        .log_activity(format!("cwd set to {}", req.working_directory))
        .await;
    Ok(Json(session.core().to_view().await))
}
