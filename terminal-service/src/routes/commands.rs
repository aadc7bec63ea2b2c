//! Foreground command execution endpoints.

use agentfs_common::ApiError;
use axum::extract::{Path, State};
use axum::Json;

use crate::executor::{self, BatchCommandRequest, BatchCommandResponse, CommandOutput, CommandRequest};
use crate::state::AppState;

pub async fn exec(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandOutput>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let output = executor::execute(&session, req).await?;
    Ok(Json(output))
}

pub async fn batch_exec(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BatchCommandRequest>,
) -> Result<Json<BatchCommandResponse>, ApiError> {
    if req.commands.is_empty() {
        return Err(ApiError::invalid_argument("commands must not be empty"));
    }
    if req.commands.len() > state.config.server.max_batch_size {
        return Err(ApiError::invalid_argument(format!(
            "batch exceeds max_batch_size ({})",
            state.config.server.max_batch_size
        )));
    }
    let session = state.sessions.get(&id).await?;
    let response = executor::batch(&session, req).await?;
    Ok(Json(response))
}
