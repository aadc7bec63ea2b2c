//! Per-session command history endpoints.

use agentfs_common::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HistoryListResponse {
    pub history: Vec<HistoryEntry>,
    pub count: usize,
}

pub async fn list_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<HistoryListResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let history = session.history.lock().await.list(query.limit);
    let count = history.len();
    Ok(Json(HistoryListResponse { history, count }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    query: String,
}

#[derive(Serialize)]
pub struct HistorySearchResponse {
    pub history: Vec<HistoryEntry>,
    pub count: usize,
    pub query: String,
}

/// `GET /sessions/{id}/history/search?query=Q` — case-sensitive substring
/// search. An empty `query` is rejected rather than matching everything.
pub async fn search_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<HistorySearchResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let history = session.history.lock().await.search(&params.query)?;
    let count = history.len();
    Ok(Json(HistorySearchResponse {
        history,
        count,
        query: params.query,
    }))
}

pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    session.history.lock().await.clear();
    Ok(Json(serde_json::json!({ "ok": true })))
}
