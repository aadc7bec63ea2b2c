//! `GenerateDiff` / `ApplyPatch` endpoints.

use agentfs_common::ApiError;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::diff::{self, DiffResponse};
use crate::routes::sessions::require_working_dir;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GenerateDiffRequest {
    pub original: Option<String>,
    pub modified: Option<String>,
    pub original_path: Option<String>,
    pub modified_path: Option<String>,
}

pub async fn generate_diff(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateDiffRequest>,
) -> Result<Json<DiffResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let max_size = state.config.server.max_file_size;

    let original = resolve_side(&working_dir, req.original, req.original_path, max_size).await?;
    let modified = resolve_side(&working_dir, req.modified, req.modified_path, max_size).await?;

    let patch = diff::generate_diff(&original, &modified);
    Ok(Json(DiffResponse { patches: diff::patch_to_text(&patch) }))
}

async fn resolve_side(
    working_dir: &std::path::Path,
    inline: Option<String>,
    path: Option<String>,
    max_size: usize,
) -> Result<String, ApiError> {
    if let Some(text) = inline {
        return Ok(text);
    }
    if let Some(path) = path {
        return Ok(crate::operations::read(working_dir, &path, max_size).await?.content);
    }
    Err(ApiError::invalid_argument(
        "request must supply either inline text or a path for each side of the diff",
    ))
}

#[derive(Deserialize)]
pub struct ApplyPatchRequest {
    pub file_path: Option<String>,
    pub original: String,
    pub patches: String,
}

#[derive(Serialize)]
pub struct ApplyPatchResponse {
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
}

pub async fn apply_patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ApplyPatchRequest>,
) -> Result<Json<ApplyPatchResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;

    let patch = diff::patch_from_text(&req.patches)?;
    let applied = diff::apply_patch(&req.original, &patch);

    if let Some(file_path) = &req.file_path {
        crate::operations::update(
            &working_dir,
            file_path,
            &applied.text,
            state.config.server.max_file_size,
        )
        .await?;
        session
            .core()
            .log_activity(format!("patched {file_path}"))
            .await;
    }

    Ok(Json(ApplyPatchResponse {
        result: applied.text,
        path: req.file_path,
        warnings: (!applied.all_applied).then(|| "not all patches applied".to_string()),
    }))
}
