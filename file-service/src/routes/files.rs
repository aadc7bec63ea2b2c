//! File/directory CRUD, batch, search, and structure-export endpoints.
//! Thin HTTP adapters over [`crate::operations`]; all path resolution and
//! size enforcement happens there.

use agentfs_common::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::operations::{self, BatchCreateEntry, FileContent, FileMetadata, SearchMatch, TreeNode};
use crate::routes::sessions::require_working_dir;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PathQuery {
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    ".".to_string()
}

/// Untagged enum so a directory read returns `{entries}` and a file read
/// returns `FileContent`'s own shape, matching how the teacher's file route
/// distinguished the two without a wrapper discriminant field.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ReadResponse {
    Directory { entries: Vec<String> },
    File(FileContent),
}

pub async fn read_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ReadResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let target = agentfs_common::util::resolve_under(&working_dir, &query.path)?;

    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|e| agentfs_common::error::from_io_error(e, &target.display().to_string()))?;

    if metadata.is_dir() {
        let entries = operations::list(&working_dir, &query.path).await?;
        Ok(Json(ReadResponse::Directory { entries }))
    } else {
        let content = operations::read(&working_dir, &query.path, state.config.server.max_file_size).await?;
        Ok(Json(ReadResponse::File(content)))
    }
}

pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileMetadata>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    Ok(Json(operations::get_metadata(&working_dir, &query.path).await?))
}

#[derive(Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

pub async fn create_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateFileRequest>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    operations::create(&working_dir, &req.path, &req.content, state.config.server.max_file_size).await?;
    session.core().log_activity(format!("created {}", req.path)).await;
    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
pub struct UpdateFileRequest {
    pub path: String,
    pub content: String,
}

pub async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    operations::update(&working_dir, &req.path, &req.content, state.config.server.max_file_size).await?;
    session.core().log_activity(format!("updated {}", req.path)).await;
    Ok(StatusCode::OK)
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    operations::delete(&working_dir, &query.path).await?;
    session.core().log_activity(format!("deleted {}", query.path)).await;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct BatchReadRequest {
    pub paths: Vec<String>,
}

#[derive(Serialize)]
pub struct BatchReadResponse {
    pub results: Vec<operations::BatchReadResult>,
}

pub async fn batch_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BatchReadRequest>,
) -> Result<Json<BatchReadResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let results = operations::batch_read(&working_dir, &req.paths, state.config.server.max_file_size).await;
    Ok(Json(BatchReadResponse { results }))
}

#[derive(Deserialize)]
pub struct BatchCreateFileSpec {
    pub path: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct BatchCreateRequest {
    pub files: Vec<BatchCreateFileSpec>,
}

#[derive(Serialize)]
pub struct BatchCreateResponse {
    pub results: Vec<operations::BatchCreateResult>,
}

pub async fn batch_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BatchCreateRequest>,
) -> Result<Json<BatchCreateResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let entries = req
        .files
        .into_iter()
        .map(|f| BatchCreateEntry { path: f.path, content: f.content })
        .collect();
    let results = operations::batch_create(&working_dir, entries, state.config.server.max_file_size).await;
    Ok(Json(BatchCreateResponse { results }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
}

pub async fn search_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let matches = operations::search(&working_dir, &query.query).await?;
    Ok(Json(SearchResponse { matches }))
}

#[derive(Deserialize)]
pub struct DepthQuery {
    pub depth: Option<usize>,
}

pub async fn export_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<TreeNode>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = require_working_dir(session.core()).await?;
    let depth = query.depth.unwrap_or(state.config.server.max_walk_depth);
    let tree = operations::export_structure(&working_dir, depth).await?;
    Ok(Json(tree))
}
