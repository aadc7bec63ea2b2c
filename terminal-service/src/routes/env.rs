//! Per-session environment variable endpoints.

use std::collections::HashMap;

use agentfs_common::ApiError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn list_env(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(session.core().env_snapshot().await))
}

pub async fn get_env(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    match session.core().env_get(&key).await {
        Some(value) => Ok(Json(json!({ "key": key, "value": value }))),
        None => Err(ApiError::not_found(format!("env var {key} not set"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum SetEnvRequest {
    Single { key: String, value: String },
    Batch(HashMap<String, String>),
}

pub async fn set_env(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetEnvRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    match req {
        SetEnvRequest::Single { key, value } => session.core().env_set(key, value).await,
        SetEnvRequest::Batch(vars) => session.core().env_set_batch(vars).await,
    }
    Ok(Json(json!({ "envVars": session.core().env_snapshot().await })))
}

pub async fn unset_env(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    session.core().env_unset(&key).await;
    Ok(Json(json!({ "ok": true })))
}
