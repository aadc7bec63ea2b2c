//! `terminal-service`'s session extension: owned background processes and
//! per-session command history, layered on [`agentfs_common::SessionCore`].

use std::collections::HashMap;
use std::sync::Arc;

use agentfs_common::{SessionCore, SessionOwner};
use tokio::sync::Mutex;

use crate::history::HistoryLog;
use crate::supervisor::ProcessHandle;

pub struct TerminalSession {
    core: SessionCore,
    pub processes: Mutex<HashMap<String, Arc<ProcessHandle>>>,
    pub history: Mutex<HistoryLog>,
}

#[async_trait::async_trait]
impl SessionOwner for TerminalSession {
    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn from_core(core: SessionCore) -> Self {
        Self {
            core,
            processes: Mutex::new(HashMap::new()),
            history: Mutex::new(HistoryLog::new()),
        }
    }

    /// Seed the session's `SHELL` entry from the host environment so
    /// `CommandExecutor`/`ProcessSupervisor` have a default shell before the
    /// client ever sets one explicitly.
    async fn post_create(&self) {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        self.core.env_set("SHELL".to_string(), shell).await;
    }

    /// Force-kill every owned process before the session record is dropped.
    async fn terminate(&self) {
        let processes: Vec<Arc<ProcessHandle>> =
            self.processes.lock().await.values().cloned().collect();
        for process in processes {
            process.force_kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use agentfs_common::SessionRegistry;

    use super::*;
    use crate::supervisor::{start_process, StartRequest};

    #[tokio::test]
    async fn post_create_seeds_a_default_shell() {
        let registry: SessionRegistry<TerminalSession> = SessionRegistry::new();
        let session = registry.create().await;
        assert!(session.core().env_get("SHELL").await.is_some());
    }

    #[tokio::test]
    async fn terminate_force_kills_owned_processes() {
        let registry: SessionRegistry<TerminalSession> = SessionRegistry::new();
        let session = registry.create().await;

        let handle = start_process(
            StartRequest {
                command: "sleep 30".to_string(),
                timeout_s: None,
                env: HashMap::new(),
            },
            std::env::temp_dir(),
            session.core().env_snapshot().await,
            &session.processes,
        )
        .await
        .unwrap();

        assert!(handle.is_running());
        session.terminate().await;
        assert!(!handle.is_running());
    }
}
