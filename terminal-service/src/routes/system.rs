//! System information and health endpoints. Mechanical — no design guidance
//! needed beyond "report what the host reports".

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /system/info` — hostname, OS, uptime, session count.
pub async fn info(State(state): State<AppState>) -> Json<Value> {
    let hostname = std::fs::read_to_string("/proc/sys/kernel/hostname")
        .unwrap_or_default()
        .trim()
        .to_string();

    Json(json!({
        "hostname": hostname,
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "sessions": state.sessions.len().await,
    }))
}

/// `GET /system/shells` — shells detected on the host, and the process'
/// default fallback shell.
pub async fn shells(State(state): State<AppState>) -> Json<Value> {
    let available = crate::shell::detect_shells();
    Json(json!({
        "availableShells": available,
        "currentShell": std::env::var("SHELL").unwrap_or_else(|_| state.config.shell.default_shell.clone()),
        "defaultShell": state.config.shell.default_shell,
    }))
}

/// `GET /health` — liveness probe for load balancers / orchestrators.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "sessions": state.sessions.len().await,
    }))
}
