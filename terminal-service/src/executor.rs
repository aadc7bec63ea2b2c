//! Foreground command execution: `Execute` and `Batch`.

use std::collections::HashMap;
use std::time::Duration;

use agentfs_common::ApiError;
use serde::{Deserialize, Serialize};

use crate::session::TerminalSession;
use crate::shell;
use crate::shell::process::{exec_command, ExecError};

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time: f64,
    pub command: String,
}

#[derive(Deserialize)]
pub struct BatchCommandRequest {
    pub commands: Vec<String>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

#[derive(Serialize)]
pub struct BatchCommandResponse {
    pub results: Vec<CommandOutput>,
    pub count: usize,
}

/// Run one command to completion in `session`'s working directory.
pub async fn execute(session: &TerminalSession, req: CommandRequest) -> Result<CommandOutput, ApiError> {
    let working_dir = session
        .core()
        .working_dir()
        .await
        .ok_or_else(|| ApiError::failed_precondition("session has no working directory set"))?;

    session.core().log_activity(format!("exec: {}", req.command)).await;
    session.history.lock().await.append(&req.command);

    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.extend(session.core().env_snapshot().await);
    env.extend(req.environment);

    let shell_candidate = env.get("SHELL").cloned().unwrap_or_default();
    let shell_path = shell::validate_and_select(&shell_candidate);

    let timeout = req.timeout.filter(|t| *t > 0).map(Duration::from_secs);

    match exec_command(&shell_path, &req.command, &working_dir, &env, timeout).await {
        Ok(out) => Ok(CommandOutput {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            execution_time: out.execution_time_s,
            command: req.command,
        }),
        Err(ExecError::Timeout(_)) => Ok(CommandOutput {
            exit_code: -1,
            stdout: String::new(),
            stderr: "command timed out".to_string(),
            execution_time: timeout.map(|d| d.as_secs_f64()).unwrap_or_default(),
            command: req.command,
        }),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

/// Run `commands` sequentially, never concurrently — later commands may
/// depend on earlier ones' filesystem side effects. When
/// `continue_on_error` is `false`, stop at the first invocation that errors
/// or exits non-zero and return the results accumulated so far.
pub async fn batch(
    session: &TerminalSession,
    req: BatchCommandRequest,
) -> Result<BatchCommandResponse, ApiError> {
    let mut results = Vec::with_capacity(req.commands.len());

    for command in req.commands {
        let single = CommandRequest {
            command,
            timeout: req.timeout,
            environment: req.environment.clone(),
        };
        let output = execute(session, single).await?;
        let failed = output.exit_code != 0;
        results.push(output);
        if failed && !req.continue_on_error {
            break;
        }
    }

    let count = results.len();
    Ok(BatchCommandResponse { results, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentfs_common::SessionRegistry;

    async fn session_with_cwd() -> std::sync::Arc<TerminalSession> {
        let registry: SessionRegistry<TerminalSession> = SessionRegistry::new();
        let session = registry.create().await;
        session
            .core()
            .set_working_dir(std::env::temp_dir())
            .await;
        session
    }

    #[tokio::test]
    async fn execute_runs_a_command_and_records_history() {
        let session = session_with_cwd().await;
        let req = CommandRequest {
            command: "echo hi".to_string(),
            timeout: None,
            environment: HashMap::new(),
        };
        let out = execute(&session, req).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(session.history.lock().await.list(None).len(), 1);
    }

    #[tokio::test]
    async fn execute_without_working_dir_fails_precondition() {
        let registry: SessionRegistry<TerminalSession> = SessionRegistry::new();
        let session = registry.create().await;
        let req = CommandRequest {
            command: "echo hi".to_string(),
            timeout: None,
            environment: HashMap::new(),
        };
        let err = execute(&session, req).await.unwrap_err();
        assert!(matches!(err, ApiError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn batch_stops_after_first_failure_by_default() {
        let session = session_with_cwd().await;
        let req = BatchCommandRequest {
            commands: vec!["exit 1".to_string(), "echo never".to_string()],
            continue_on_error: false,
            timeout: None,
            environment: HashMap::new(),
        };
        let result = batch(&session, req).await.unwrap();
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn batch_continues_past_failures_when_requested() {
        let session = session_with_cwd().await;
        let req = BatchCommandRequest {
            commands: vec!["exit 1".to_string(), "echo still-here".to_string()],
            continue_on_error: true,
            timeout: None,
            environment: HashMap::new(),
        };
        let result = batch(&session, req).await.unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.results[1].stdout.trim(), "still-here");
    }
}
