//! Background process supervision: spawn, collect output, signal, reap.
//!
//! This is the hardest part of the system. A [`ProcessHandle`] owns a child
//! whose stdin/stdout/stderr are all pipes. Four tasks run for its
//! lifetime: a stdin-writer, a stdout-collector, a stderr-collector, and a
//! reaper. The handle stays reachable from its owning session until the
//! session force-kills it (on delete/expiry) or it exits naturally.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentfs_common::ApiError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::shell;

const OUTPUT_LINE_CAP: usize = 10_000;
const FANOUT_CAP: usize = 100;
const REAP_DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Bounded, dual-stream line buffer for one process's output, with a
/// best-effort real-time fan-out channel per stream.
pub struct OutputBuffer {
    stdout: Mutex<VecDeque<String>>,
    stderr: Mutex<VecDeque<String>>,
    stdout_tx: broadcast::Sender<String>,
    stderr_tx: broadcast::Sender<String>,
}

impl OutputBuffer {
    fn new() -> Self {
        let (stdout_tx, _) = broadcast::channel(FANOUT_CAP);
        let (stderr_tx, _) = broadcast::channel(FANOUT_CAP);
        Self {
            stdout: Mutex::new(VecDeque::with_capacity(OUTPUT_LINE_CAP.min(1024))),
            stderr: Mutex::new(VecDeque::with_capacity(OUTPUT_LINE_CAP.min(1024))),
            stdout_tx,
            stderr_tx,
        }
    }

    async fn push_stdout(&self, line: String) {
        let mut buf = self.stdout.lock().await;
        if buf.len() >= OUTPUT_LINE_CAP {
            buf.pop_front();
        }
        buf.push_back(line.clone());
        drop(buf);
        // A full or closed broadcast channel never blocks the sender; a
        // lagging subscriber simply misses lines, which satisfies the
        // "drop on full rather than block the collector" contract.
        let _ = self.stdout_tx.send(line);
    }

    async fn push_stderr(&self, line: String) {
        let mut buf = self.stderr.lock().await;
        if buf.len() >= OUTPUT_LINE_CAP {
            buf.pop_front();
        }
        buf.push_back(line.clone());
        drop(buf);
        let _ = self.stderr_tx.send(line);
    }

    /// Snapshot both streams under their respective locks, independent of
    /// writes still in flight.
    pub async fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let stdout = self.stdout.lock().await.iter().cloned().collect();
        let stderr = self.stderr.lock().await.iter().cloned().collect();
        (stdout, stderr)
    }

    pub fn subscribe_stdout(&self) -> broadcast::Receiver<String> {
        self.stdout_tx.subscribe()
    }

    pub fn subscribe_stderr(&self) -> broadcast::Receiver<String> {
        self.stderr_tx.subscribe()
    }
}

/// A running or completed background process.
pub struct ProcessHandle {
    pub id: String,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub pid: u32,
    pgid: i32,
    completed: AtomicBool,
    exit_code: AtomicI32,
    pub buffer: Arc<OutputBuffer>,
    stdin_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    completion: Arc<Notify>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// JSON view of a process (§6 `ProcessInfo`).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub id: String,
    pub command: String,
    pub start_time: String,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub pid: u32,
}

impl ProcessHandle {
    pub async fn info(&self) -> ProcessInfo {
        let completed = self.completed.load(Ordering::Acquire);
        ProcessInfo {
            id: self.id.clone(),
            command: self.command.clone(),
            start_time: self.start_time.to_rfc3339(),
            is_running: !completed,
            exit_code: completed.then(|| self.exit_code.load(Ordering::Acquire)),
            pid: self.pid,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.completed.load(Ordering::Acquire)
    }

    /// Write `input` to the child's stdin, appending a trailing newline if
    /// the caller didn't include one.
    pub async fn send_input(&self, input: &str) -> Result<(), ApiError> {
        let guard = self.stdin_tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| ApiError::failed_precondition("process stdin is closed"))?;
        let mut bytes = input.as_bytes().to_vec();
        if !input.ends_with('\n') {
            bytes.push(b'\n');
        }
        tx.send(bytes)
            .await
            .map_err(|_| ApiError::failed_precondition("process stdin is closed"))
    }

    /// Deliver a signal to the child's process group. Only `SIGTERM`,
    /// `SIGKILL`, `SIGINT`, `SIGHUP` are accepted (with or without the
    /// leading `SIG`).
    pub fn signal(&self, name: &str) -> Result<(), ApiError> {
        let sig = parse_signal(name)
            .ok_or_else(|| ApiError::invalid_argument(format!("unsupported signal: {name}")))?;
        // SAFETY: kill(2) with a negative pid targets the process group;
        // pgid was recorded at spawn time from setpgid(0, 0).
        let ret = unsafe { libc::kill(-self.pgid, sig) };
        if ret != 0 && self.is_running() {
            return Err(ApiError::internal(format!(
                "kill({}, {sig}) failed: {}",
                -self.pgid,
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Force-kill via SIGKILL and wait briefly for the reaper to observe
    /// completion. Used on session delete/expiry.
    pub async fn force_kill(&self) {
        if self.is_running() {
            // SAFETY: see `signal`.
            unsafe {
                libc::kill(-self.pgid, libc::SIGKILL);
            }
        }
        let wait = tokio::time::timeout(Duration::from_secs(3), self.completion.notified());
        let _ = wait.await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

fn parse_signal(name: &str) -> Option<libc::c_int> {
    let normalized = name.trim().to_uppercase();
    let normalized = normalized.strip_prefix("SIG").unwrap_or(&normalized);
    match normalized {
        "TERM" => Some(libc::SIGTERM),
        "KILL" => Some(libc::SIGKILL),
        "INT" => Some(libc::SIGINT),
        "HUP" => Some(libc::SIGHUP),
        _ => None,
    }
}

/// Request body for `StartProcess` (shared with `CommandExecutor::Execute`).
pub struct StartRequest {
    pub command: String,
    pub timeout_s: Option<u64>,
    pub env: HashMap<String, String>,
}

/// Spawn a background process under `working_dir`, composing env as host ++
/// session ++ request, and register it under `processes`.
pub async fn start_process(
    req: StartRequest,
    working_dir: PathBuf,
    session_env: HashMap<String, String>,
    processes: &Mutex<HashMap<String, Arc<ProcessHandle>>>,
) -> Result<Arc<ProcessHandle>, ApiError> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.extend(session_env.clone());
    env.extend(req.env);

    let shell_candidate = session_env
        .get("SHELL")
        .cloned()
        .unwrap_or_else(|| "/bin/bash".to_string());
    let shell = shell::validate_and_select(&shell_candidate);

    let mut child = shell::process::spawn_shell_pgroup(
        &shell,
        &req.command,
        &working_dir,
        &env,
        std::process::Stdio::piped(),
        std::process::Stdio::piped(),
        std::process::Stdio::piped(),
    )
    .map_err(|e| ApiError::internal(format!("failed to spawn process: {e}")))?;

    let pid = child.id().unwrap_or(0);
    #[allow(clippy::cast_possible_wrap)]
    let pgid = pid as i32;

    let stdin_pipe = child.stdin.take().expect("stdin was piped");
    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let buffer = Arc::new(OutputBuffer::new());
    let completion = Arc::new(Notify::new());
    let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(64);

    let handle = Arc::new(ProcessHandle {
        id: Uuid::new_v4().to_string(),
        command: req.command.clone(),
        start_time: Utc::now(),
        pid,
        pgid,
        completed: AtomicBool::new(false),
        exit_code: AtomicI32::new(-1),
        buffer: buffer.clone(),
        stdin_tx: Mutex::new(Some(stdin_tx)),
        completion: completion.clone(),
        tasks: Mutex::new(Vec::new()),
    });

    let stdin_task = tokio::spawn(stdin_writer(stdin_pipe, stdin_rx));
    let stdout_task = tokio::spawn(stream_collector(stdout_pipe, buffer.clone(), true));
    let stderr_task = tokio::spawn(stream_collector(stderr_pipe, buffer.clone(), false));
    let timeout = req.timeout_s.filter(|t| *t > 0).map(Duration::from_secs);
    let reaper_task = tokio::spawn(reap(
        child,
        pgid,
        handle.clone(),
        completion,
        timeout,
    ));

    *handle.tasks.lock().await = vec![stdin_task, stdout_task, stderr_task, reaper_task];

    processes
        .lock()
        .await
        .insert(handle.id.clone(), handle.clone());

    Ok(handle)
}

async fn stdin_writer(
    mut pipe: tokio::process::ChildStdin,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(bytes) = rx.recv().await {
        if pipe.write_all(&bytes).await.is_err() {
            break;
        }
    }
}

async fn stream_collector(pipe: impl tokio::io::AsyncRead + Unpin, buffer: Arc<OutputBuffer>, is_stdout: bool) {
    let mut reader = BufReader::new(pipe);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = line.trim_end_matches('\n').to_string();
                if is_stdout {
                    buffer.push_stdout(text).await;
                } else {
                    buffer.push_stderr(text).await;
                }
            }
            Err(_) => break,
        }
    }
    // `read_line` on a truncated final line (no trailing `\n` before EOF)
    // still returns the partial content in `line` with Ok(n>0), so the
    // loop above already flushes it; nothing further to do here.
}

async fn reap(
    mut child: Child,
    pgid: i32,
    handle: Arc<ProcessHandle>,
    completion: Arc<Notify>,
    timeout: Option<Duration>,
) {
    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(process_id = %handle.id, "process timed out, killing process group");
                // SAFETY: pgid recorded at spawn from setpgid(0, 0).
                unsafe {
                    libc::kill(-pgid, libc::SIGKILL);
                }
                child.wait().await
            }
        },
        None => child.wait().await,
    };

    #[allow(clippy::cast_possible_wrap)]
    let exit_code = match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            tracing::warn!(process_id = %handle.id, error = %e, "error waiting for process");
            -1
        }
    };

    handle.exit_code.store(exit_code, Ordering::Release);
    handle.completed.store(true, Ordering::Release);
    tracing::info!(process_id = %handle.id, exit_code, "process exited");

    // Give the collectors a moment to drain any straggler bytes already in
    // the pipe before observers are notified of completion.
    tokio::time::sleep(REAP_DRAIN_DELAY).await;
    *handle.stdin_tx.lock().await = None;
    completion.notify_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(command: &str) -> (Arc<ProcessHandle>, Mutex<HashMap<String, Arc<ProcessHandle>>>) {
        let processes = Mutex::new(HashMap::new());
        let handle = start_process(
            StartRequest {
                command: command.to_string(),
                timeout_s: None,
                env: HashMap::new(),
            },
            std::env::temp_dir(),
            HashMap::from([("SHELL".to_string(), "/bin/sh".to_string())]),
            &processes,
        )
        .await
        .unwrap();
        (handle, processes)
    }

    #[tokio::test]
    async fn start_process_collects_stdout_and_completes() {
        let (handle, _processes) = spawn("echo hello; echo world").await;
        tokio::time::timeout(Duration::from_secs(2), handle.completion.notified())
            .await
            .unwrap();
        let (stdout, _stderr) = handle.buffer.snapshot().await;
        assert_eq!(stdout, vec!["hello".to_string(), "world".to_string()]);
        assert!(!handle.is_running());
        assert_eq!(handle.exit_code.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn send_input_is_delivered_to_the_child() {
        let (handle, _processes) = spawn("read line; echo \"got:$line\"").await;
        handle.send_input("ping").await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle.completion.notified())
            .await
            .unwrap();
        let (stdout, _stderr) = handle.buffer.snapshot().await;
        assert_eq!(stdout, vec!["got:ping".to_string()]);
    }

    #[tokio::test]
    async fn signal_term_stops_a_running_process() {
        let (handle, _processes) = spawn("sleep 30").await;
        assert!(handle.is_running());
        handle.signal("TERM").unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle.completion.notified())
            .await
            .unwrap();
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn signal_rejects_unknown_signal_names() {
        let (handle, _processes) = spawn("sleep 1").await;
        let err = handle.signal("BOGUS").unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        handle.force_kill().await;
    }

    #[tokio::test]
    async fn force_kill_terminates_and_aborts_tasks() {
        let (handle, _processes) = spawn("sleep 30").await;
        handle.force_kill().await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn output_buffer_evicts_oldest_line_past_capacity() {
        let buffer = OutputBuffer::new();
        for i in 0..OUTPUT_LINE_CAP + 5 {
            buffer.push_stdout(format!("line-{i}")).await;
        }
        let (stdout, _) = buffer.snapshot().await;
        assert_eq!(stdout.len(), OUTPUT_LINE_CAP);
        assert_eq!(stdout.first().unwrap(), "line-5");
    }
}
