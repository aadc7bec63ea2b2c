//! Project-context endpoints: a human-readable report and the machine-
//! readable summary it's built from.

use agentfs_common::ApiError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::context::{self, ContextReportData, ContextSummary};
use crate::routes::sessions::require_working_dir;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ContextQuery {
    pub depth: Option<usize>,
    #[serde(default)]
    pub include_hidden: bool,
}

pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> Result<Json<ContextReportData>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let depth = query.depth.unwrap_or(state.config.server.max_walk_depth);
    let data = context::context_report(&working_dir, depth, query.include_hidden).await?;
    Ok(Json(data))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> Result<Json<ContextSummary>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let depth = query.depth.unwrap_or(state.config.server.max_walk_depth);
    let data = context::summarize(&working_dir, depth, query.include_hidden).await?;
    Ok(Json(data))
}
