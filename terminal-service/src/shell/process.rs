//! Child-process spawning primitives shared by the foreground executor and
//! the background supervisor.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Spawn `shell -c command` with the given cwd/env, making the child the
/// leader of a new process group (`setpgid(0, 0)` in `pre_exec`) so signals
/// can later be delivered to the whole tree it spawns via `kill(-pgid, _)`.
pub fn spawn_shell_pgroup(
    shell: &str,
    command: &str,
    cwd: &Path,
    env: &HashMap<String, String>,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    // SAFETY: pre_exec runs after fork, before exec, in the child. Only
    // async-signal-safe calls are made here (setpgid).
    unsafe {
        cmd.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }

    cmd.spawn()
}

/// Result of a one-shot foreground execution.
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_s: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn shell: {0}")]
    SpawnFailed(std::io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("process I/O error: {0}")]
    Io(std::io::Error),
}

/// Run `shell -c command` to completion, capturing stdout/stderr fully
/// (unbounded — unlike file reads, a foreground command's caller owns the
/// decision to run something with large output). Stdout and stderr are
/// drained concurrently to avoid a full-pipe deadlock. If `timeout` fires
/// the child is killed and `ExecError::Timeout` is returned without the
/// caller blocking further.
pub async fn exec_command(
    shell: &str,
    command: &str,
    cwd: &Path,
    env: &HashMap<String, String>,
    timeout: Option<Duration>,
) -> Result<ExecOutput, ExecError> {
    let start = Instant::now();
    let mut child = spawn_shell_pgroup(
        shell,
        command,
        cwd,
        env,
        Stdio::null(),
        Stdio::piped(),
        Stdio::piped(),
    )
    .map_err(ExecError::SpawnFailed)?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let drain = async {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let (out_res, err_res) = tokio::join!(
            stdout_pipe.read_to_end(&mut out_buf),
            stderr_pipe.read_to_end(&mut err_buf),
        );
        out_res.map_err(ExecError::Io)?;
        err_res.map_err(ExecError::Io)?;
        let status = child.wait().await.map_err(ExecError::Io)?;
        Ok::<_, ExecError>((status, out_buf, err_buf))
    };

    let (status, out_buf, err_buf) = match timeout {
        Some(limit) => match tokio::time::timeout(limit, drain).await {
            Ok(result) => result?,
            Err(_) => {
                // Best-effort: the child (and kill_on_drop) will be reaped
                // when `child` drops here since `drain` owned it and was
                // cancelled. Nothing further to await.
                return Err(ExecError::Timeout(limit));
            }
        },
        None => drain.await?,
    };

    let execution_time_s = start.elapsed().as_secs_f64();
    #[allow(clippy::cast_possible_wrap)]
    let exit_code = status.code().unwrap_or(-1);

    Ok(ExecOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&out_buf).into_owned(),
        stderr: String::from_utf8_lossy(&err_buf).into_owned(),
        execution_time_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_command_captures_stdout_and_exit_code() {
        let cwd = std::env::temp_dir();
        let env = HashMap::new();
        let out = exec_command("/bin/sh", "echo hello", &cwd, &env, None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn exec_command_reports_nonzero_exit_code() {
        let cwd = std::env::temp_dir();
        let env = HashMap::new();
        let out = exec_command("/bin/sh", "exit 7", &cwd, &env, None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 7);
    }

    #[tokio::test]
    async fn exec_command_times_out_on_a_hanging_command() {
        let cwd = std::env::temp_dir();
        let env = HashMap::new();
        let err = exec_command("/bin/sh", "sleep 5", &cwd, &env, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
    }

    #[tokio::test]
    async fn exec_command_only_sees_the_requested_environment() {
        let cwd = std::env::temp_dir();
        let mut env = HashMap::new();
        env.insert("GREETING".to_string(), "hi".to_string());
        let out = exec_command("/bin/sh", "echo $GREETING", &cwd, &env, None)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
    }
}
