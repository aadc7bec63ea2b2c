//! Background process endpoints.

use agentfs_common::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::executor::CommandRequest;
use crate::state::AppState;
use crate::supervisor::{self, ProcessInfo, StartRequest};

pub async fn start_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<(StatusCode, Json<ProcessInfo>), ApiError> {
    let session = state.sessions.get(&id).await?;
    let working_dir = session
        .core()
        .working_dir()
        .await
        .ok_or_else(|| ApiError::failed_precondition("session has no working directory set"))?;

    session
        .core()
        .log_activity(format!("start process: {}", req.command))
        .await;
    session.history.lock().await.append(&req.command);

    let session_env = session.core().env_snapshot().await;
    let start_req = StartRequest {
        command: req.command,
        timeout_s: req.timeout,
        env: req.environment,
    };

    let handle = supervisor::start_process(start_req, working_dir, session_env, &session.processes).await?;
    tracing::info!(process_id = %handle.id, pid = handle.pid, "process started");
    Ok((StatusCode::CREATED, Json(handle.info().await)))
}

#[derive(Serialize)]
pub struct ProcessListResponse {
    pub processes: Vec<ProcessInfo>,
    pub count: usize,
}

pub async fn list_processes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessListResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let handles: Vec<_> = session.processes.lock().await.values().cloned().collect();
    let mut processes = Vec::with_capacity(handles.len());
    for handle in &handles {
        processes.push(handle.info().await);
    }
    let count = processes.len();
    Ok(Json(ProcessListResponse { processes, count }))
}

pub async fn get_process(
    State(state): State<AppState>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<ProcessInfo>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let handle = session
        .processes
        .lock()
        .await
        .get(&pid)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("process {pid} not found")))?;
    Ok(Json(handle.info().await))
}

pub async fn get_output(
    State(state): State<AppState>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let handle = session
        .processes
        .lock()
        .await
        .get(&pid)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("process {pid} not found")))?;
    let (stdout, stderr) = handle.buffer.snapshot().await;
    Ok(Json(json!({ "stdout": stdout, "stderr": stderr })))
}

#[derive(Deserialize)]
pub struct InputRequest {
    pub input: String,
}

pub async fn send_input(
    State(state): State<AppState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<InputRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let handle = session
        .processes
        .lock()
        .await
        .get(&pid)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("process {pid} not found")))?;
    handle.send_input(&req.input).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct SignalRequest {
    pub signal: String,
}

pub async fn signal_process(
    State(state): State<AppState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<SignalRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&id).await?;
    let handle = session
        .processes
        .lock()
        .await
        .get(&pid)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("process {pid} not found")))?;
    handle.signal(&req.signal)?;
    Ok(Json(json!({ "ok": true })))
}
